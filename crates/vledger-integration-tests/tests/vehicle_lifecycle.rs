//! End-to-end vehicle lifecycle through the contract, store and chain.
//!
//! Each scenario runs against a durable ledger in a temporary directory so
//! the write-ahead log, snapshot and chain files are all exercised.

use std::sync::Arc;
use std::thread;

use vledger_chain::ChainConfig;
use vledger_contract::{
    EventKind, Ledger, LedgerOptions, OwnerInput, TransferInput, VehicleInput,
};
use vledger_core::{Organization, OwnerEmail, PlateNumber, Vin};
use vledger_state::{
    HistoryAction, RecoveryInput, TheftInput, VehicleDetails, VehicleStatus, VehicleUpdate,
    VerificationState, VerifierKind, ViolationInput,
};
use vledger_store::StoreOptions;

const VIN: &str = "1HGCM82633A004352";

fn options() -> LedgerOptions {
    LedgerOptions {
        chain: ChainConfig {
            difficulty: 1,
            max_attempts: 1_000_000,
            batch_size: 10,
            seal_deadline: None,
        },
        store: StoreOptions { snapshot_every: 4 },
        event_capacity: 0,
    }
}

fn vin() -> Vin {
    Vin::new(VIN).unwrap()
}

fn owner(email: &str, name: &str) -> OwnerInput {
    OwnerInput {
        email: email.into(),
        name: name.into(),
        id: None,
    }
}

fn vehicle(vin: &str, plate: &str) -> VehicleInput {
    VehicleInput {
        vin: vin.into(),
        plate_number: Some(plate.into()),
        details: VehicleDetails {
            make: "Honda".into(),
            model: "Accord".into(),
            year: 2003,
            ..Default::default()
        },
        owner: Some(owner("alice@example.com", "Alice")),
    }
}

fn approve_all(ledger: &Ledger, vin: &Vin) {
    ledger
        .update_verification_status(
            Organization::Insurer,
            vin,
            VerifierKind::Insurance,
            VerificationState::Approved,
            Some("policy 42".into()),
        )
        .unwrap();
    ledger
        .update_verification_status(
            Organization::EmissionTester,
            vin,
            VerifierKind::Emission,
            VerificationState::Approved,
            None,
        )
        .unwrap();
    ledger
        .update_verification_status(
            Organization::Registrar,
            vin,
            VerifierKind::Admin,
            VerificationState::Approved,
            None,
        )
        .unwrap();
}

#[test]
fn register_and_approve_yields_five_history_entries() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(dir.path(), options()).unwrap();

    let reg = ledger
        .register_vehicle(Organization::Registrar, vehicle(VIN, "KA01AB1234"))
        .unwrap();
    assert_eq!(reg.value.status, VehicleStatus::Registered);
    approve_all(&ledger, &vin());

    let record = ledger.get_vehicle(&vin()).unwrap();
    assert_eq!(record.status, VehicleStatus::Approved);
    let actions: Vec<HistoryAction> = record.history.iter().map(|h| h.action).collect();
    assert_eq!(
        actions,
        vec![
            HistoryAction::Registered,
            HistoryAction::VerificationUpdated,
            HistoryAction::VerificationUpdated,
            HistoryAction::VerificationUpdated,
            HistoryAction::Approved,
        ]
    );
    for pair in record.history.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
    // The synthetic entry shares the transaction of the update that caused it.
    assert_eq!(record.history[3].tx_id, record.history[4].tx_id);
    assert_eq!(ledger.get_chain_stats().transactions, 4);
}

#[test]
fn rejection_after_approval_reopens_verification() {
    let ledger = Ledger::in_memory(options()).unwrap();
    ledger
        .register_vehicle(Organization::Registrar, vehicle(VIN, "KA01AB1234"))
        .unwrap();
    approve_all(&ledger, &vin());

    ledger
        .update_verification_status(
            Organization::Insurer,
            &vin(),
            VerifierKind::Insurance,
            VerificationState::Rejected,
            Some("policy cancelled".into()),
        )
        .unwrap();
    let record = ledger.get_vehicle(&vin()).unwrap();
    assert_eq!(record.status, VehicleStatus::Registered);
    assert_eq!(
        record.history.last().unwrap().action,
        HistoryAction::VerificationReopened
    );

    ledger
        .update_verification_status(
            Organization::Insurer,
            &vin(),
            VerifierKind::Insurance,
            VerificationState::Approved,
            None,
        )
        .unwrap();
    assert_eq!(
        ledger.get_vehicle(&vin()).unwrap().status,
        VehicleStatus::Approved
    );
}

#[test]
fn unauthorized_calls_change_nothing() {
    let ledger = Ledger::in_memory(options()).unwrap();
    ledger
        .register_vehicle(Organization::Registrar, vehicle(VIN, "KA01AB1234"))
        .unwrap();
    let before = ledger.get_vehicle(&vin()).unwrap();
    let height = ledger.get_chain_stats().transactions;
    let events = ledger.get_events(None).len();

    let attempts = [
        ledger
            .update_verification_status(
                Organization::Enforcement,
                &vin(),
                VerifierKind::Admin,
                VerificationState::Approved,
                None,
            )
            .map(|_| ()),
        ledger
            .transfer_ownership(
                Organization::Insurer,
                &vin(),
                owner("bob@example.com", "Bob"),
                TransferInput {
                    current_owner_email: "alice@example.com".into(),
                    reason: None,
                },
            )
            .map(|_| ()),
        ledger
            .update_vehicle(
                Organization::Manufacturer,
                &vin(),
                VehicleUpdate {
                    color: Some("Red".into()),
                    ..Default::default()
                },
            )
            .map(|_| ()),
        ledger.delete_vehicle(Organization::Enforcement, &vin()).map(|_| ()),
        ledger
            .report_stolen(Organization::Insurer, &vin(), TheftInput::default())
            .map(|_| ()),
        ledger
            .report_violation(
                Organization::EmissionTester,
                &vin(),
                ViolationInput {
                    violation_type: "SPEEDING".into(),
                    ..Default::default()
                },
            )
            .map(|_| ()),
    ];
    for result in attempts {
        assert_eq!(result.unwrap_err().code(), "UNAUTHORIZED");
    }

    assert_eq!(ledger.get_vehicle(&vin()).unwrap(), before);
    assert_eq!(ledger.get_chain_stats().transactions, height);
    assert_eq!(ledger.get_events(None).len(), events);
    assert!(ledger.audit_indices().unwrap().is_empty());
}

#[test]
fn transfer_moves_owner_index_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(dir.path(), options()).unwrap();
    ledger
        .register_vehicle(Organization::Registrar, vehicle(VIN, "KA01AB1234"))
        .unwrap();

    let transferred = ledger
        .transfer_ownership(
            Organization::Registrar,
            &vin(),
            owner("bob@example.com", "Bob"),
            TransferInput {
                current_owner_email: "ALICE@example.com".into(),
                reason: Some("private sale".into()),
            },
        )
        .unwrap();
    assert_eq!(
        transferred.value.owner.as_ref().unwrap().email.as_str(),
        "bob@example.com"
    );

    let alice = OwnerEmail::new("alice@example.com").unwrap();
    let bob = OwnerEmail::new("bob@example.com").unwrap();
    assert!(ledger.get_vehicles_by_owner(&alice).unwrap().is_empty());
    assert_eq!(ledger.get_owner(&bob).unwrap().vehicles, vec![vin()]);
    assert!(ledger.audit_indices().unwrap().is_empty());

    let event = ledger.get_events(Some(&vin())).pop().unwrap();
    assert_eq!(event.name, EventKind::OwnershipTransferred);
    assert_eq!(event.payload["previousOwner"]["email"], "alice@example.com");
    assert_eq!(event.payload["newOwner"]["email"], "bob@example.com");

    // A second transfer asserting the old owner is stale.
    let err = ledger
        .transfer_ownership(
            Organization::Registrar,
            &vin(),
            owner("carol@example.com", "Carol"),
            TransferInput {
                current_owner_email: "alice@example.com".into(),
                reason: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), "OWNER_MISMATCH");
}

#[test]
fn stolen_and_recovered_restores_previous_status() {
    let ledger = Ledger::in_memory(options()).unwrap();
    ledger
        .register_vehicle(Organization::Registrar, vehicle(VIN, "KA01AB1234"))
        .unwrap();
    approve_all(&ledger, &vin());

    let stolen = ledger
        .report_stolen(
            Organization::Enforcement,
            &vin(),
            TheftInput {
                location: Some("Bengaluru".into()),
                report_reference: Some("FIR-881".into()),
                description: "taken overnight".into(),
            },
        )
        .unwrap();
    assert_eq!(stolen.value.previous_status, VehicleStatus::Approved);
    assert_eq!(
        ledger.get_vehicles_by_status(VehicleStatus::Stolen).unwrap().len(),
        1
    );

    // Transfer and verification are blocked while stolen; violations are not.
    let err = ledger
        .transfer_ownership(
            Organization::Registrar,
            &vin(),
            owner("bob@example.com", "Bob"),
            TransferInput {
                current_owner_email: "alice@example.com".into(),
                reason: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE");
    ledger
        .report_violation(
            Organization::Enforcement,
            &vin(),
            ViolationInput {
                violation_type: "RED_LIGHT".into(),
                ..Default::default()
            },
        )
        .unwrap();

    let recovered = ledger
        .mark_recovered(Organization::Registrar, &vin(), RecoveryInput::default())
        .unwrap();
    assert_eq!(recovered.value.restored_status, VehicleStatus::Approved);
    let record = ledger.get_vehicle(&vin()).unwrap();
    assert_eq!(record.status, VehicleStatus::Approved);
    assert!(record.stolen_report.is_some());
    assert!(record.recovery_report.is_some());
    assert_eq!(record.violations.len(), 1);
}

#[test]
fn mint_register_update_plate_delete() {
    let ledger = Ledger::in_memory(options()).unwrap();
    let mut minted = vehicle(VIN, "TEMP0001");
    minted.owner = None;
    ledger
        .mint_vehicle(Organization::Manufacturer, minted)
        .unwrap();
    assert_eq!(
        ledger.get_vehicles_by_status(VehicleStatus::Minted).unwrap().len(),
        1
    );

    ledger
        .register_vehicle(Organization::Registrar, vehicle(VIN, "KA01AB1234"))
        .unwrap();
    ledger
        .update_vehicle(
            Organization::Registrar,
            &vin(),
            VehicleUpdate {
                color: Some("Graphite".into()),
                fuel_type: Some("Petrol".into()),
                ..Default::default()
            },
        )
        .unwrap();
    ledger
        .change_plate(
            Organization::Registrar,
            &vin(),
            PlateNumber::new("KA05MN7777").unwrap(),
        )
        .unwrap();
    assert!(ledger.audit_indices().unwrap().is_empty());
    let by_plate = ledger
        .get_vehicle_by_plate(&PlateNumber::new("ka05mn7777").unwrap())
        .unwrap();
    assert_eq!(by_plate.details.color.as_deref(), Some("Graphite"));

    let deleted = ledger.delete_vehicle(Organization::Registrar, &vin()).unwrap();
    assert_eq!(deleted.value.vin, vin());
    assert!(ledger.get_all_vehicles().unwrap().is_empty());
    assert!(ledger.audit_indices().unwrap().is_empty());

    let names: Vec<EventKind> = ledger.get_events(None).iter().map(|e| e.name).collect();
    assert_eq!(
        names,
        vec![
            EventKind::VehicleMinted,
            EventKind::Registered,
            EventKind::VehicleUpdated,
            EventKind::VehicleUpdated,
            EventKind::VehicleDeleted,
        ]
    );
    assert!(ledger.verify_chain().valid);
}

#[test]
fn reopen_restores_records_indices_and_chain() {
    let dir = tempfile::tempdir().unwrap();
    {
        let ledger = Ledger::open(dir.path(), options()).unwrap();
        for i in 0..6 {
            ledger
                .register_vehicle(
                    Organization::Registrar,
                    vehicle(&format!("VIN{i:05}"), &format!("PLATE{i}")),
                )
                .unwrap();
        }
        ledger
            .transfer_ownership(
                Organization::Registrar,
                &Vin::new("VIN00002").unwrap(),
                owner("bob@example.com", "Bob"),
                TransferInput {
                    current_owner_email: "alice@example.com".into(),
                    reason: None,
                },
            )
            .unwrap();
    }

    let ledger = Ledger::open(dir.path(), options()).unwrap();
    assert_eq!(ledger.get_all_vehicles().unwrap().len(), 6);
    let alice = OwnerEmail::new("alice@example.com").unwrap();
    assert_eq!(ledger.get_vehicles_by_owner(&alice).unwrap().len(), 5);
    assert!(ledger.audit_indices().unwrap().is_empty());
    assert_eq!(ledger.get_chain_stats().transactions, 7);
    assert!(ledger.verify_chain().valid);
    let stats = ledger.get_system_stats().unwrap();
    assert_eq!(stats.total_owners, 2);
    assert_eq!(stats.by_status["REGISTERED"], 6);
}

#[test]
fn eleventh_transaction_opens_a_new_block() {
    let ledger = Ledger::in_memory(options()).unwrap();
    for i in 0..11 {
        ledger
            .register_vehicle(
                Organization::Registrar,
                vehicle(&format!("VIN{i:05}"), &format!("PLATE{i}")),
            )
            .unwrap();
    }
    let stats = ledger.get_chain_stats();
    assert_eq!(stats.height, 2);
    assert_eq!(ledger.get_block(1).unwrap().transactions.len(), 10);
    let tip = ledger.get_latest_block();
    assert_eq!(tip.transactions.len(), 1);
    assert_eq!(tip.previous_hash, ledger.get_block(1).unwrap().block_hash);
    assert!(ledger.verify_chain().valid);
}

#[test]
fn concurrent_writers_are_serialized() {
    let ledger = Arc::new(Ledger::in_memory(options()).unwrap());
    ledger
        .register_vehicle(Organization::Registrar, vehicle(VIN, "KA01AB1234"))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                ledger
                    .report_violation(
                        Organization::Enforcement,
                        &Vin::new(VIN).unwrap(),
                        ViolationInput {
                            violation_type: format!("V{i}"),
                            ..Default::default()
                        },
                    )
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let record = ledger.get_vehicle(&vin()).unwrap();
    assert_eq!(record.violations.len(), 8);
    assert_eq!(record.history.len(), 9);
    assert_eq!(ledger.get_chain_stats().transactions, 9);
    assert!(ledger.verify_chain().valid);
}
