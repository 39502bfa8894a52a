//! # Ledger
//!
//! The explicit ledger object: owns the store, the chain emulator and the
//! event log, and exposes every state-machine operation and query.
//!
//! ## Commit pipeline
//!
//! Each mutating operation runs the same steps:
//!
//! 1. **Authorize** against the static table; reject before reading state.
//! 2. **Serialize**: take the single writer lock. All mutations are
//!    serialized, so two calls on one VIN can never interleave between read
//!    and write.
//! 3. **Stage**: load the record, apply the pure transition to a copy, and
//!    collect the record write, index delete/put pairs and owner profile
//!    into one [`WriteBatch`]. Nothing is persisted yet.
//! 4. **Seal**: build the transaction and stage the new chain tip, including
//!    the bounded proof-of-work search. A search failure aborts here with no
//!    state change.
//! 5. **Commit** the batch (WAL fsync), install the chain tip, rewrite the
//!    chain files.
//! 6. **Emit** the event.
//!
//! ## Journal
//!
//! The transaction rides in the same store batch as the record change,
//! under [`Partition::Journal`]. The store commit is therefore the single
//! commit point: if the chain files are not rewritten afterwards (a failed
//! persist, or a crash between the two writes) the transaction stays in the
//! journal and [`Ledger::open`] appends it to the chain in commit order.
//! Journal entries are deleted by the next batch once the chain files are
//! known to hold them.

use std::path::Path;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use vledger_chain::{
    Block, ChainConfig, ChainError, ChainStats, IntegrityReport, LocalChain, Transaction,
};
use vledger_core::{Organization, OwnerEmail, PlateNumber, Timestamp, TxId, Vin};
use vledger_state::{
    HistoryEntry, Owner, RecoveryInput, RecoveryReport, StolenReport, TheftInput,
    TransitionContext, VehicleRecord, VehicleStatus, VehicleUpdate, VerificationState,
    VerifierKind, ViolationInput, ViolationRecord,
};
use vledger_store::{
    stage_owner_change, stage_plate_change, vin_by_plate, vins_by_owner, KvStore, Partition,
    StoreOptions, WriteBatch,
};

use crate::auth::{self, OperationCategory};
use crate::error::LedgerError;
use crate::events::{EventKind, EventLog, LedgerEvent};
use crate::inputs::{OwnerInput, TransferInput, VehicleInput};
use crate::queries::{OwnerProfile, SystemStats, TransactionReceipt};

/// Construction parameters.
#[derive(Debug, Clone, Default)]
pub struct LedgerOptions {
    pub chain: ChainConfig,
    pub store: StoreOptions,
    /// Retained events; `0` selects [`EventLog::DEFAULT_CAPACITY`].
    pub event_capacity: usize,
}

/// A committed mutation's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Committed<T> {
    pub value: T,
    pub tx_id: TxId,
    pub timestamp: Timestamp,
    pub block_number: u64,
}

/// A staged mutation, ready for the commit pipeline.
struct Mutation<T> {
    vin: Vin,
    batch: WriteBatch,
    event: EventKind,
    /// Event fields; also recorded as the transaction's output.
    event_payload: Value,
    /// Effective input, recorded in the transaction.
    input: Value,
    value: T,
}

/// A committed transaction as recorded in the store journal.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JournalEntry {
    /// Store sequence of the batch that committed it.
    sequence: u64,
    transaction: Transaction,
}

/// State owned by the writer lock.
#[derive(Debug, Default)]
struct Writer {
    /// Journal keys already in the persisted chain files.
    settled: Vec<TxId>,
    /// Journal keys held only by the in-memory chain.
    unsettled: Vec<TxId>,
}

/// The vehicle ledger.
#[derive(Debug)]
pub struct Ledger {
    store: KvStore,
    chain: RwLock<LocalChain>,
    events: EventLog,
    writer: Mutex<Writer>,
}

impl Ledger {
    /// Open a durable ledger in `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>, options: LedgerOptions) -> Result<Self, LedgerError> {
        let dir = data_dir.as_ref();
        let store = KvStore::open(dir, options.store)?;
        let mut chain = LocalChain::open(dir, options.chain)?;
        let settled = Self::reconcile(&store, &mut chain)?;
        let ledger = Self::assemble(store, chain, options.event_capacity);
        ledger.writer.lock().settled = settled;
        Ok(ledger)
    }

    /// Append journaled transactions missing from the chain, in commit
    /// order, and persist. Returns every journal key.
    fn reconcile(store: &KvStore, chain: &mut LocalChain) -> Result<Vec<TxId>, LedgerError> {
        let mut entries: Vec<JournalEntry> = store.values(Partition::Journal)?;
        entries.sort_by_key(|e| e.sequence);
        let mut restored = 0usize;
        for entry in &entries {
            if chain.transaction(&entry.transaction.id).is_none() {
                chain.append(entry.transaction.clone())?;
                restored += 1;
            }
        }
        if restored > 0 {
            chain.persist()?;
            tracing::warn!(
                restored,
                height = chain.height(),
                "journaled transactions restored to the chain"
            );
        }
        Ok(entries.into_iter().map(|e| e.transaction.id).collect())
    }

    /// A non-durable ledger.
    pub fn in_memory(options: LedgerOptions) -> Result<Self, LedgerError> {
        let chain = LocalChain::in_memory(options.chain)?;
        Ok(Self::assemble(KvStore::in_memory(), chain, options.event_capacity))
    }

    fn assemble(store: KvStore, chain: LocalChain, event_capacity: usize) -> Self {
        let events = if event_capacity == 0 {
            EventLog::default()
        } else {
            EventLog::new(event_capacity)
        };
        Self {
            store,
            chain: RwLock::new(chain),
            events,
            writer: Mutex::new(Writer::default()),
        }
    }

    /// The event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ─── Commit pipeline ─────────────────────────────────────────────

    fn mutate<T: Serialize>(
        &self,
        function: &'static str,
        category: OperationCategory,
        caller: Organization,
        stage: impl FnOnce(&TransitionContext) -> Result<Mutation<T>, LedgerError>,
    ) -> Result<Committed<T>, LedgerError> {
        let result = self.run_mutation(function, category, caller, stage);
        if let Err(e) = &result {
            tracing::warn!(
                function,
                organization = %caller,
                code = e.code(),
                error = %e,
                "ledger call rejected"
            );
        }
        result
    }

    fn run_mutation<T: Serialize>(
        &self,
        function: &'static str,
        category: OperationCategory,
        caller: Organization,
        stage: impl FnOnce(&TransitionContext) -> Result<Mutation<T>, LedgerError>,
    ) -> Result<Committed<T>, LedgerError> {
        auth::require(category, caller)?;
        let mut writer = self.writer.lock();

        let ctx = TransitionContext::new(TxId::generate(), Timestamp::now(), caller);
        let m = stage(&ctx)?;

        let tx_payload = json!({
            "vin": m.vin,
            "organization": caller,
            "input": m.input,
            "output": m.event_payload,
        });
        let tx = Transaction::new(ctx.tx_id.clone(), function, tx_payload, ctx.timestamp)
            .map_err(ChainError::from)?;
        let staged = self.chain.read().stage(tx.clone())?;

        let mut batch = m.batch;
        for id in &writer.settled {
            batch.delete(Partition::Journal, id.as_str());
        }
        let entry = JournalEntry {
            sequence: self.store.sequence() + 1,
            transaction: tx,
        };
        batch.put(Partition::Journal, ctx.tx_id.as_str(), &entry)?;
        self.store.commit(batch)?;
        writer.settled.clear();
        writer.unsettled.push(ctx.tx_id.clone());

        let block_number = {
            let mut chain = self.chain.write();
            let number = chain.apply(staged)?.block_number;
            match chain.persist() {
                Ok(()) => {
                    let persisted = std::mem::take(&mut writer.unsettled);
                    writer.settled.extend(persisted);
                }
                Err(e) => tracing::error!(
                    tx_id = %ctx.tx_id,
                    journaled = writer.unsettled.len(),
                    error = %e,
                    "chain persistence failed, transaction kept in the journal"
                ),
            }
            number
        };

        tracing::info!(
            event = m.event.as_str(),
            vin = %m.vin,
            tx_id = %ctx.tx_id,
            organization = %caller,
            block = block_number,
            "{function} committed"
        );
        self.events.publish(LedgerEvent {
            name: m.event,
            vin: m.vin,
            tx_id: ctx.tx_id.clone(),
            timestamp: ctx.timestamp,
            organization: caller,
            payload: m.event_payload,
        });

        Ok(Committed {
            value: m.value,
            tx_id: ctx.tx_id,
            timestamp: ctx.timestamp,
            block_number,
        })
    }

    fn load(&self, vin: &Vin) -> Result<VehicleRecord, LedgerError> {
        self.store
            .get::<VehicleRecord>(Partition::Vehicles, vin.as_str())?
            .ok_or_else(|| LedgerError::NotFound(format!("vehicle {vin}")))
    }

    fn ensure_plate_free(&self, plate: &PlateNumber, vin: &Vin) -> Result<(), LedgerError> {
        match vin_by_plate(&self.store, plate) {
            Some(holder) if &holder != vin => Err(LedgerError::AlreadyExists(format!(
                "plate {plate} is assigned to {holder}"
            ))),
            _ => Ok(()),
        }
    }

    fn stage_record(batch: &mut WriteBatch, record: &VehicleRecord) -> Result<(), LedgerError> {
        batch.put(Partition::Vehicles, record.vin.as_str(), record)?;
        Ok(())
    }

    fn stage_owner_profile(batch: &mut WriteBatch, owner: &Owner) -> Result<(), LedgerError> {
        batch.put(Partition::Owners, owner.email.as_str(), owner)?;
        Ok(())
    }

    // ─── Creation ────────────────────────────────────────────────────

    /// Create an owner-less placeholder record in `MINTED`.
    pub fn mint_vehicle(
        &self,
        caller: Organization,
        input: VehicleInput,
    ) -> Result<Committed<VehicleRecord>, LedgerError> {
        self.mutate("MintVehicle", OperationCategory::Mint, caller, |ctx| {
            if input.owner.is_some() {
                return Err(LedgerError::InvalidArgument(
                    "a minted vehicle has no owner; use RegisterVehicle".into(),
                ));
            }
            let v = input.validate()?;
            if self.store.contains(Partition::Vehicles, v.vin.as_str()) {
                return Err(LedgerError::AlreadyExists(format!("vehicle {}", v.vin)));
            }
            if let Some(plate) = &v.plate {
                self.ensure_plate_free(plate, &v.vin)?;
            }

            let record = VehicleRecord::mint(v.vin.clone(), v.plate.clone(), v.details, ctx);
            let mut batch = WriteBatch::new();
            Self::stage_record(&mut batch, &record)?;
            stage_plate_change(&mut batch, &record.vin, None, record.plate_number.as_ref())?;

            Ok(Mutation {
                vin: v.vin,
                batch,
                event: EventKind::VehicleMinted,
                event_payload: json!({
                    "plateNumber": record.plate_number,
                    "make": record.details.make,
                    "model": record.details.model,
                    "year": record.details.year,
                    "status": record.status,
                }),
                input: serde_json::to_value(&input)?,
                value: record,
            })
        })
    }

    /// Register a vehicle with its owner.
    ///
    /// A `MINTED` record with the same VIN is claimed: the owner is attached
    /// and the supplied plate and details replace the minted ones. Any other
    /// existing record fails `AlreadyExists`.
    pub fn register_vehicle(
        &self,
        caller: Organization,
        input: VehicleInput,
    ) -> Result<Committed<VehicleRecord>, LedgerError> {
        self.mutate("RegisterVehicle", OperationCategory::Register, caller, |ctx| {
            let v = input.validate()?;
            let owner = input
                .owner
                .clone()
                .ok_or_else(|| LedgerError::InvalidArgument("owner is required".into()))?
                .validate()?;

            let existing = self
                .store
                .get::<VehicleRecord>(Partition::Vehicles, v.vin.as_str())?;
            let (record, old_plate) = match existing {
                None => (
                    VehicleRecord::register(
                        v.vin.clone(),
                        v.plate.clone(),
                        v.details,
                        owner.clone(),
                        ctx,
                    ),
                    None,
                ),
                Some(mut minted) if minted.status == VehicleStatus::Minted => {
                    let old_plate = minted.plate_number.clone();
                    minted.attach_owner(owner.clone(), v.plate.clone(), Some(v.details), ctx)?;
                    (minted, old_plate)
                }
                Some(other) => {
                    return Err(LedgerError::AlreadyExists(format!(
                        "vehicle {} ({})",
                        other.vin, other.status
                    )))
                }
            };
            if let Some(plate) = &record.plate_number {
                self.ensure_plate_free(plate, &record.vin)?;
            }

            let mut batch = WriteBatch::new();
            Self::stage_record(&mut batch, &record)?;
            Self::stage_owner_profile(&mut batch, &owner)?;
            stage_owner_change(&mut batch, &record.vin, None, Some(&owner.email))?;
            stage_plate_change(
                &mut batch,
                &record.vin,
                old_plate.as_ref(),
                record.plate_number.as_ref(),
            )?;

            Ok(Mutation {
                vin: v.vin,
                batch,
                event: EventKind::Registered,
                event_payload: json!({
                    "owner": owner,
                    "plateNumber": record.plate_number,
                    "make": record.details.make,
                    "model": record.details.model,
                    "year": record.details.year,
                    "status": record.status,
                }),
                input: serde_json::to_value(&input)?,
                value: record,
            })
        })
    }

    // ─── Verification ────────────────────────────────────────────────

    /// Set one verification gate.
    pub fn update_verification_status(
        &self,
        caller: Organization,
        vin: &Vin,
        kind: VerifierKind,
        state: VerificationState,
        notes: Option<String>,
    ) -> Result<Committed<VehicleRecord>, LedgerError> {
        let category = OperationCategory::for_verifier(kind);
        self.mutate("UpdateVerificationStatus", category, caller, |ctx| {
            let mut record = self.load(vin)?;
            let outcome = record.update_verification(kind, state, notes.clone(), ctx)?;

            let mut batch = WriteBatch::new();
            Self::stage_record(&mut batch, &record)?;

            Ok(Mutation {
                vin: vin.clone(),
                batch,
                event: EventKind::VerificationUpdated,
                event_payload: json!({
                    "verifierType": kind,
                    "previous": outcome.previous,
                    "verificationStatus": state,
                    "notes": notes,
                    "status": record.status,
                    "becameApproved": outcome.became_approved,
                    "reopened": outcome.reopened,
                }),
                input: json!({"verifierType": kind, "status": state, "notes": notes}),
                value: record,
            })
        })
    }

    // ─── Ownership & details ─────────────────────────────────────────

    /// Replace the owner, moving the owner-index entry in the same batch.
    pub fn transfer_ownership(
        &self,
        caller: Organization,
        vin: &Vin,
        new_owner: OwnerInput,
        transfer: TransferInput,
    ) -> Result<Committed<VehicleRecord>, LedgerError> {
        self.mutate("TransferOwnership", OperationCategory::Transfer, caller, |ctx| {
            let new_owner = new_owner.validate()?;
            let asserted = OwnerEmail::new(&transfer.current_owner_email).map_err(|_| {
                LedgerError::InvalidArgument("currentOwnerEmail is required".into())
            })?;
            let mut record = self.load(vin)?;
            let previous =
                record.transfer_ownership(&asserted, new_owner.clone(), transfer.reason.clone(), ctx)?;

            let mut batch = WriteBatch::new();
            Self::stage_record(&mut batch, &record)?;
            Self::stage_owner_profile(&mut batch, &new_owner)?;
            stage_owner_change(&mut batch, vin, Some(&previous.email), Some(&new_owner.email))?;

            Ok(Mutation {
                vin: vin.clone(),
                batch,
                event: EventKind::OwnershipTransferred,
                event_payload: json!({
                    "previousOwner": previous,
                    "newOwner": new_owner,
                    "reason": transfer.reason,
                }),
                input: json!({"newOwner": new_owner, "transfer": transfer}),
                value: record,
            })
        })
    }

    /// Update allow-listed cosmetic fields.
    pub fn update_vehicle(
        &self,
        caller: Organization,
        vin: &Vin,
        update: VehicleUpdate,
    ) -> Result<Committed<VehicleRecord>, LedgerError> {
        self.mutate("UpdateVehicle", OperationCategory::Update, caller, |ctx| {
            let mut record = self.load(vin)?;
            let changed = record.apply_update(&update, ctx)?;

            let mut batch = WriteBatch::new();
            Self::stage_record(&mut batch, &record)?;

            Ok(Mutation {
                vin: vin.clone(),
                batch,
                event: EventKind::VehicleUpdated,
                event_payload: json!({ "changedFields": changed, "updates": update }),
                input: serde_json::to_value(&update)?,
                value: record,
            })
        })
    }

    /// Replace the plate, rewriting the plate index in the same batch.
    pub fn change_plate(
        &self,
        caller: Organization,
        vin: &Vin,
        plate: PlateNumber,
    ) -> Result<Committed<VehicleRecord>, LedgerError> {
        self.mutate("ChangePlate", OperationCategory::Update, caller, |ctx| {
            let mut record = self.load(vin)?;
            self.ensure_plate_free(&plate, vin)?;
            let previous = record.change_plate(plate.clone(), ctx)?;

            let mut batch = WriteBatch::new();
            Self::stage_record(&mut batch, &record)?;
            stage_plate_change(&mut batch, vin, previous.as_ref(), Some(&plate))?;

            Ok(Mutation {
                vin: vin.clone(),
                batch,
                event: EventKind::VehicleUpdated,
                event_payload: json!({
                    "changedFields": ["plateNumber"],
                    "previousPlate": previous,
                    "plateNumber": plate,
                }),
                input: json!({ "plateNumber": plate }),
                value: record,
            })
        })
    }

    /// Physically remove a record and both of its index entries.
    ///
    /// Returns the record as it was before removal.
    pub fn delete_vehicle(
        &self,
        caller: Organization,
        vin: &Vin,
    ) -> Result<Committed<VehicleRecord>, LedgerError> {
        self.mutate("DeleteVehicle", OperationCategory::Delete, caller, |_ctx| {
            let record = self.load(vin)?;

            let mut batch = WriteBatch::new();
            batch.delete(Partition::Vehicles, vin.as_str());
            stage_owner_change(&mut batch, vin, record.owner_email(), None)?;
            stage_plate_change(&mut batch, vin, record.plate_number.as_ref(), None)?;

            Ok(Mutation {
                vin: vin.clone(),
                batch,
                event: EventKind::VehicleDeleted,
                event_payload: json!({
                    "previousStatus": record.status,
                    "status": VehicleStatus::Deleted,
                    "owner": record.owner_email(),
                    "plateNumber": record.plate_number,
                }),
                input: json!({ "vin": vin }),
                value: record,
            })
        })
    }

    // ─── Enforcement ─────────────────────────────────────────────────

    /// Append a traffic violation.
    pub fn report_violation(
        &self,
        caller: Organization,
        vin: &Vin,
        input: ViolationInput,
    ) -> Result<Committed<ViolationRecord>, LedgerError> {
        self.mutate("ReportViolation", OperationCategory::ReportViolation, caller, |ctx| {
            let mut record = self.load(vin)?;
            let violation = record.report_violation(input.clone(), ctx)?;

            let mut batch = WriteBatch::new();
            Self::stage_record(&mut batch, &record)?;

            Ok(Mutation {
                vin: vin.clone(),
                batch,
                event: EventKind::ViolationReported,
                event_payload: json!({
                    "violation": violation,
                    "totalViolations": record.violations.len(),
                }),
                input: serde_json::to_value(&input)?,
                value: violation,
            })
        })
    }

    /// Move a vehicle to `STOLEN`.
    pub fn report_stolen(
        &self,
        caller: Organization,
        vin: &Vin,
        input: TheftInput,
    ) -> Result<Committed<StolenReport>, LedgerError> {
        self.mutate("ReportStolen", OperationCategory::ReportStolen, caller, |ctx| {
            let mut record = self.load(vin)?;
            let report = record.report_stolen(input.clone(), ctx)?;

            let mut batch = WriteBatch::new();
            Self::stage_record(&mut batch, &record)?;

            Ok(Mutation {
                vin: vin.clone(),
                batch,
                event: EventKind::VehicleStolen,
                event_payload: json!({
                    "report": report,
                    "previousStatus": report.previous_status,
                }),
                input: serde_json::to_value(&input)?,
                value: report,
            })
        })
    }

    /// Leave `STOLEN`, restoring the pre-theft status.
    pub fn mark_recovered(
        &self,
        caller: Organization,
        vin: &Vin,
        input: RecoveryInput,
    ) -> Result<Committed<RecoveryReport>, LedgerError> {
        self.mutate("MarkRecovered", OperationCategory::MarkRecovered, caller, |ctx| {
            let mut record = self.load(vin)?;
            let report = record.mark_recovered(input.clone(), ctx)?;

            let mut batch = WriteBatch::new();
            Self::stage_record(&mut batch, &record)?;

            Ok(Mutation {
                vin: vin.clone(),
                batch,
                event: EventKind::VehicleRecovered,
                event_payload: json!({
                    "report": report,
                    "restoredStatus": report.restored_status,
                }),
                input: serde_json::to_value(&input)?,
                value: report,
            })
        })
    }

    // ─── Queries ─────────────────────────────────────────────────────

    /// One record.
    pub fn get_vehicle(&self, vin: &Vin) -> Result<VehicleRecord, LedgerError> {
        self.load(vin)
    }

    /// One record's history.
    pub fn get_vehicle_history(&self, vin: &Vin) -> Result<Vec<HistoryEntry>, LedgerError> {
        Ok(self.load(vin)?.history)
    }

    /// Every record, in VIN order.
    pub fn get_all_vehicles(&self) -> Result<Vec<VehicleRecord>, LedgerError> {
        Ok(self.store.values(Partition::Vehicles)?)
    }

    /// Records in `status`.
    pub fn get_vehicles_by_status(
        &self,
        status: VehicleStatus,
    ) -> Result<Vec<VehicleRecord>, LedgerError> {
        let mut all = self.get_all_vehicles()?;
        all.retain(|r| r.status == status);
        Ok(all)
    }

    /// Records whose `kind` gate reads `state`.
    pub fn get_vehicles_by_verification_status(
        &self,
        kind: VerifierKind,
        state: VerificationState,
    ) -> Result<Vec<VehicleRecord>, LedgerError> {
        let mut all = self.get_all_vehicles()?;
        all.retain(|r| r.verification_status.get(kind) == state);
        Ok(all)
    }

    /// Records currently owned by `email`, via the owner index.
    pub fn get_vehicles_by_owner(
        &self,
        email: &OwnerEmail,
    ) -> Result<Vec<VehicleRecord>, LedgerError> {
        vins_by_owner(&self.store, email)
            .iter()
            .map(|vin| self.load(vin))
            .collect()
    }

    /// The record carrying `plate`, via the plate index.
    pub fn get_vehicle_by_plate(&self, plate: &PlateNumber) -> Result<VehicleRecord, LedgerError> {
        let vin = vin_by_plate(&self.store, plate)
            .ok_or_else(|| LedgerError::NotFound(format!("plate {plate}")))?;
        self.load(&vin)
    }

    /// Owner profile and the VINs indexed to it.
    pub fn get_owner(&self, email: &OwnerEmail) -> Result<OwnerProfile, LedgerError> {
        let owner = self
            .store
            .get::<Owner>(Partition::Owners, email.as_str())?
            .ok_or_else(|| LedgerError::NotFound(format!("owner {email}")))?;
        Ok(OwnerProfile {
            owner,
            vehicles: vins_by_owner(&self.store, email),
        })
    }

    /// Aggregate counters.
    pub fn get_system_stats(&self) -> Result<SystemStats, LedgerError> {
        let records = self.get_all_vehicles()?;
        Ok(SystemStats::aggregate(
            &records,
            self.store.len(Partition::Owners),
            self.chain.read().stats(),
        ))
    }

    /// Retained events, optionally for one VIN.
    pub fn get_events(&self, vin: Option<&Vin>) -> Vec<LedgerEvent> {
        self.events.events(vin)
    }

    /// Check the index invariants against the stored records.
    ///
    /// Returns one line per violation; empty means consistent.
    pub fn audit_indices(&self) -> Result<Vec<String>, LedgerError> {
        let mut problems = Vec::new();
        let records = self.get_all_vehicles()?;
        for r in &records {
            if let Some(email) = r.owner_email() {
                if !vins_by_owner(&self.store, email).contains(&r.vin) {
                    problems.push(format!("{}: missing owner index for {email}", r.vin));
                }
            }
            if let Some(plate) = &r.plate_number {
                if vin_by_plate(&self.store, plate).as_ref() != Some(&r.vin) {
                    problems.push(format!("{}: missing plate index for {plate}", r.vin));
                }
            }
        }
        for key in self.store.keys_with_prefix(Partition::Index, "") {
            let Some((index, parts)) = vledger_store::parse_composite_key(&key) else {
                problems.push(format!("non-composite index key {key:?}"));
                continue;
            };
            let (Some(component), Some(vin)) = (parts.first(), parts.get(1)) else {
                problems.push(format!("malformed {index} entry"));
                continue;
            };
            let Some(record) = records.iter().find(|r| r.vin.as_str() == vin) else {
                problems.push(format!("{index} entry for missing vehicle {vin}"));
                continue;
            };
            let matches = match index.as_str() {
                vledger_store::OWNER_INDEX => {
                    record.owner_email().map(|e| e.as_str()) == Some(component.as_str())
                }
                vledger_store::PLATE_INDEX => {
                    record.plate_number.as_ref().map(|p| p.as_str()) == Some(component.as_str())
                }
                _ => false,
            };
            if !matches {
                problems.push(format!("stale {index} entry {component} -> {vin}"));
            }
        }
        Ok(problems)
    }

    // ─── Chain inspection ────────────────────────────────────────────

    /// Block by number.
    pub fn get_block(&self, number: u64) -> Result<Block, LedgerError> {
        self.chain
            .read()
            .block(number)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("block {number}")))
    }

    /// The tip block.
    pub fn get_latest_block(&self) -> Block {
        self.chain.read().latest().clone()
    }

    /// Transaction by id.
    pub fn get_transaction(&self, id: &TxId) -> Result<TransactionReceipt, LedgerError> {
        let chain = self.chain.read();
        let (tx, block_number) = chain
            .transaction(id)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
        Ok(TransactionReceipt {
            transaction: tx.clone(),
            block_number,
        })
    }

    /// Chain counters.
    pub fn get_chain_stats(&self) -> ChainStats {
        self.chain.read().stats()
    }

    /// Re-derive and check the whole chain.
    pub fn verify_chain(&self) -> IntegrityReport {
        self.chain.read().verify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vledger_state::{HistoryAction, VehicleDetails};

    const VIN: &str = "1HGCM82633A004352";

    fn ledger() -> Ledger {
        Ledger::in_memory(LedgerOptions {
            chain: ChainConfig {
                difficulty: 1,
                max_attempts: 1_000_000,
                batch_size: 10,
                seal_deadline: None,
            },
            ..Default::default()
        })
        .unwrap()
    }

    fn vin() -> Vin {
        Vin::new(VIN).unwrap()
    }

    fn alice() -> OwnerInput {
        OwnerInput {
            email: "alice@example.com".into(),
            name: "Alice".into(),
            id: Some("u-1".into()),
        }
    }

    fn bob() -> OwnerInput {
        OwnerInput {
            email: "bob@example.com".into(),
            name: "Bob".into(),
            id: None,
        }
    }

    fn vehicle(owner: Option<OwnerInput>) -> VehicleInput {
        VehicleInput {
            vin: VIN.into(),
            plate_number: Some("KA01AB1234".into()),
            details: VehicleDetails {
                make: "Honda".into(),
                model: "Accord".into(),
                year: 2003,
                ..Default::default()
            },
            owner,
        }
    }

    fn registered() -> Ledger {
        let l = ledger();
        l.register_vehicle(Organization::Registrar, vehicle(Some(alice())))
            .unwrap();
        l
    }

    fn approve_all(l: &Ledger) {
        for (kind, org) in [
            (VerifierKind::Insurance, Organization::Insurer),
            (VerifierKind::Emission, Organization::EmissionTester),
            (VerifierKind::Admin, Organization::Registrar),
        ] {
            l.update_verification_status(org, &vin(), kind, VerificationState::Approved, None)
                .unwrap();
        }
    }

    // ── Registration ─────────────────────────────────────────────────

    #[test]
    fn test_register_writes_record_indices_and_event() {
        let l = ledger();
        let c = l
            .register_vehicle(Organization::Registrar, vehicle(Some(alice())))
            .unwrap();
        assert_eq!(c.block_number, 1);
        assert_eq!(c.value.status, VehicleStatus::Registered);

        let owner = OwnerEmail::new("alice@example.com").unwrap();
        assert_eq!(l.get_vehicles_by_owner(&owner).unwrap().len(), 1);
        let plate = PlateNumber::new("KA01AB1234").unwrap();
        assert_eq!(l.get_vehicle_by_plate(&plate).unwrap().vin, vin());
        assert_eq!(l.get_owner(&owner).unwrap().owner.name, "Alice");

        let events = l.get_events(Some(&vin()));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, EventKind::Registered);
        assert_eq!(events[0].tx_id, c.tx_id);
        assert!(l.get_transaction(&c.tx_id).is_ok());
        assert!(l.audit_indices().unwrap().is_empty());
    }

    #[test]
    fn test_register_twice_already_exists() {
        let l = registered();
        let err = l
            .register_vehicle(Organization::Registrar, vehicle(Some(alice())))
            .unwrap_err();
        assert_eq!(err.code(), "ALREADY_EXISTS");
        assert_eq!(l.get_chain_stats().transactions, 1);
    }

    #[test]
    fn test_register_requires_owner() {
        let l = ledger();
        let err = l
            .register_vehicle(Organization::Registrar, vehicle(None))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_unknown_vin_not_found() {
        let l = ledger();
        assert_eq!(l.get_vehicle(&vin()).unwrap_err().code(), "NOT_FOUND");
        assert_eq!(l.get_vehicle_history(&vin()).unwrap_err().code(), "NOT_FOUND");
    }

    #[test]
    fn test_unauthorized_register_leaves_nothing() {
        let l = ledger();
        for org in [
            Organization::Insurer,
            Organization::EmissionTester,
            Organization::Enforcement,
            Organization::Manufacturer,
        ] {
            let err = l.register_vehicle(org, vehicle(Some(alice()))).unwrap_err();
            assert_eq!(err.code(), "UNAUTHORIZED");
        }
        assert!(l.get_all_vehicles().unwrap().is_empty());
        assert_eq!(l.get_chain_stats().height, 0);
        assert!(l.get_events(None).is_empty());
    }

    #[test]
    fn test_duplicate_plate_rejected() {
        let l = registered();
        let mut other = vehicle(Some(bob()));
        other.vin = "OTHERVIN1".into();
        assert_eq!(
            l.register_vehicle(Organization::Registrar, other)
                .unwrap_err()
                .code(),
            "ALREADY_EXISTS"
        );
    }

    // ── Mint ─────────────────────────────────────────────────────────

    #[test]
    fn test_mint_then_register_claims_record() {
        let l = ledger();
        let minted = l
            .mint_vehicle(Organization::Manufacturer, vehicle(None))
            .unwrap();
        assert_eq!(minted.value.status, VehicleStatus::Minted);
        assert!(minted.value.owner.is_none());

        let mut reg = vehicle(Some(alice()));
        reg.plate_number = Some("MH12ZZ0001".into());
        let r = l.register_vehicle(Organization::Registrar, reg).unwrap();
        assert_eq!(r.value.status, VehicleStatus::Registered);
        assert_eq!(r.value.history.len(), 2);

        // The minted plate entry moved to the new plate.
        assert!(l
            .get_vehicle_by_plate(&PlateNumber::new("KA01AB1234").unwrap())
            .is_err());
        assert!(l
            .get_vehicle_by_plate(&PlateNumber::new("MH12ZZ0001").unwrap())
            .is_ok());
        assert!(l.audit_indices().unwrap().is_empty());
    }

    #[test]
    fn test_mint_rejects_owner_and_wrong_org() {
        let l = ledger();
        assert_eq!(
            l.mint_vehicle(Organization::Manufacturer, vehicle(Some(alice())))
                .unwrap_err()
                .code(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(
            l.mint_vehicle(Organization::Insurer, vehicle(None))
                .unwrap_err()
                .code(),
            "UNAUTHORIZED"
        );
    }

    // ── Verification ─────────────────────────────────────────────────

    #[test]
    fn test_full_approval_scenario() {
        let l = registered();
        approve_all(&l);
        let r = l.get_vehicle(&vin()).unwrap();
        assert_eq!(r.status, VehicleStatus::Approved);
        assert_eq!(r.history.len(), 5);
        assert_eq!(r.history[4].action, HistoryAction::Approved);
        assert_eq!(l.get_vehicles_by_status(VehicleStatus::Approved).unwrap().len(), 1);
    }

    #[test]
    fn test_wrong_verifier_org_rejected_without_change() {
        let l = registered();
        let err = l
            .update_verification_status(
                Organization::EmissionTester,
                &vin(),
                VerifierKind::Insurance,
                VerificationState::Approved,
                None,
            )
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
        assert_eq!(l.get_vehicle_history(&vin()).unwrap().len(), 1);
    }

    #[test]
    fn test_verification_query() {
        let l = registered();
        l.update_verification_status(
            Organization::Insurer,
            &vin(),
            VerifierKind::Insurance,
            VerificationState::Rejected,
            Some("lapsed".into()),
        )
        .unwrap();
        let rejected = l
            .get_vehicles_by_verification_status(VerifierKind::Insurance, VerificationState::Rejected)
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].notes[&VerifierKind::Insurance], "lapsed");
        assert_eq!(l.get_system_stats().unwrap().rejected_verification, 1);
    }

    // ── Transfer ─────────────────────────────────────────────────────

    #[test]
    fn test_transfer_moves_owner_index() {
        let l = registered();
        l.transfer_ownership(
            Organization::Registrar,
            &vin(),
            bob(),
            TransferInput {
                current_owner_email: "alice@example.com".into(),
                reason: Some("sale".into()),
            },
        )
        .unwrap();
        let alice = OwnerEmail::new("alice@example.com").unwrap();
        let bob = OwnerEmail::new("bob@example.com").unwrap();
        assert!(l.get_vehicles_by_owner(&alice).unwrap().is_empty());
        assert_eq!(l.get_vehicles_by_owner(&bob).unwrap().len(), 1);
        assert!(l.audit_indices().unwrap().is_empty());
    }

    #[test]
    fn test_transfer_owner_mismatch() {
        let l = registered();
        let err = l
            .transfer_ownership(
                Organization::Registrar,
                &vin(),
                bob(),
                TransferInput {
                    current_owner_email: "mallory@example.com".into(),
                    reason: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "OWNER_MISMATCH");
        assert_eq!(
            l.get_vehicle(&vin()).unwrap().owner.unwrap().email.as_str(),
            "alice@example.com"
        );
    }

    // ── Update / plate / delete ──────────────────────────────────────

    #[test]
    fn test_update_and_change_plate() {
        let l = registered();
        l.update_vehicle(
            Organization::Registrar,
            &vin(),
            VehicleUpdate {
                color: Some("Blue".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let new_plate = PlateNumber::new("DL3CAB0001").unwrap();
        l.change_plate(Organization::Registrar, &vin(), new_plate.clone())
            .unwrap();
        let r = l.get_vehicle_by_plate(&new_plate).unwrap();
        assert_eq!(r.details.color.as_deref(), Some("Blue"));
        assert!(l.audit_indices().unwrap().is_empty());
        assert_eq!(
            l.update_vehicle(Organization::Enforcement, &vin(), VehicleUpdate::default())
                .unwrap_err()
                .code(),
            "UNAUTHORIZED"
        );
    }

    #[test]
    fn test_noop_update_records_nothing() {
        let l = registered();
        let update = VehicleUpdate {
            color: Some("Blue".into()),
            ..Default::default()
        };
        l.update_vehicle(Organization::Registrar, &vin(), update.clone())
            .unwrap();
        let history = l.get_vehicle_history(&vin()).unwrap().len();
        let events = l.get_events(Some(&vin())).len();

        let err = l
            .update_vehicle(Organization::Registrar, &vin(), update)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
        assert_eq!(l.get_vehicle_history(&vin()).unwrap().len(), history);
        assert_eq!(l.get_events(Some(&vin())).len(), events);
        assert_eq!(l.get_chain_stats().transactions, 2);
    }

    #[test]
    fn test_delete_removes_record_and_indices() {
        let l = registered();
        let c = l.delete_vehicle(Organization::Registrar, &vin()).unwrap();
        assert_eq!(c.value.vin, vin());
        assert_eq!(l.get_vehicle(&vin()).unwrap_err().code(), "NOT_FOUND");
        assert!(l
            .get_vehicles_by_owner(&OwnerEmail::new("alice@example.com").unwrap())
            .unwrap()
            .is_empty());
        assert!(l.audit_indices().unwrap().is_empty());
        let last = l.get_events(None).pop().unwrap();
        assert_eq!(last.name, EventKind::VehicleDeleted);
        assert_eq!(last.payload["status"], "DELETED");
    }

    // ── Theft ────────────────────────────────────────────────────────

    #[test]
    fn test_stolen_recovered_roundtrip() {
        let l = registered();
        approve_all(&l);
        l.report_stolen(Organization::Enforcement, &vin(), TheftInput::default())
            .unwrap();
        assert_eq!(
            l.report_stolen(Organization::Enforcement, &vin(), TheftInput::default())
                .unwrap_err()
                .code(),
            "INVALID_STATE"
        );
        let rec = l
            .mark_recovered(Organization::Enforcement, &vin(), RecoveryInput::default())
            .unwrap();
        assert_eq!(rec.value.restored_status, VehicleStatus::Approved);
        assert_eq!(
            l.mark_recovered(Organization::Enforcement, &vin(), RecoveryInput::default())
                .unwrap_err()
                .code(),
            "INVALID_STATE"
        );
    }

    #[test]
    fn test_violation_by_insurer_unauthorized() {
        let l = registered();
        let input = ViolationInput {
            violation_type: "SPEEDING".into(),
            ..Default::default()
        };
        assert_eq!(
            l.report_violation(Organization::Insurer, &vin(), input.clone())
                .unwrap_err()
                .code(),
            "UNAUTHORIZED"
        );
        let c = l
            .report_violation(Organization::Enforcement, &vin(), input)
            .unwrap();
        assert_eq!(c.value.violation_type, "SPEEDING");
        assert_eq!(l.get_system_stats().unwrap().total_violations, 1);
    }

    // ── Chain ────────────────────────────────────────────────────────

    #[test]
    fn test_every_commit_lands_on_chain() {
        let l = registered();
        approve_all(&l);
        let stats = l.get_chain_stats();
        assert_eq!(stats.transactions, 4);
        assert_eq!(l.get_latest_block().transactions.len(), 4);
        assert!(l.verify_chain().valid);
        assert!(l.get_block(7).is_err());
    }

    #[test]
    fn test_durable_ledger_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let options = LedgerOptions {
            chain: ChainConfig {
                difficulty: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        {
            let l = Ledger::open(dir.path(), options.clone()).unwrap();
            l.register_vehicle(Organization::Registrar, vehicle(Some(alice())))
                .unwrap();
        }
        let l = Ledger::open(dir.path(), options).unwrap();
        assert_eq!(l.get_vehicle(&vin()).unwrap().status, VehicleStatus::Registered);
        assert_eq!(l.get_chain_stats().transactions, 1);
        assert!(l.verify_chain().valid);
    }

    #[test]
    fn test_journal_keeps_only_unconfirmed_transactions() {
        let l = registered();
        assert_eq!(l.store.len(Partition::Journal), 1);
        approve_all(&l);
        // Each batch deletes the entries the previous persist confirmed.
        assert_eq!(l.store.len(Partition::Journal), 1);
        let latest = l.get_latest_block();
        let last_tx = &latest.transactions[latest.transactions.len() - 1];
        assert!(l.store.contains(Partition::Journal, last_tx.id.as_str()));
    }

    #[test]
    fn test_unpersisted_transactions_restored_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let options = LedgerOptions {
            chain: ChainConfig {
                difficulty: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let journal = Transaction::new(
            TxId::new("tx-journal-only"),
            "RegisterVehicle",
            json!({"vin": VIN}),
            Timestamp::now(),
        )
        .unwrap();
        {
            let store = KvStore::open(dir.path(), StoreOptions::default()).unwrap();
            let mut batch = WriteBatch::new();
            batch
                .put(
                    Partition::Journal,
                    journal.id.as_str(),
                    &JournalEntry {
                        sequence: 1,
                        transaction: journal.clone(),
                    },
                )
                .unwrap();
            store.commit(batch).unwrap();
        }

        let l = Ledger::open(dir.path(), options.clone()).unwrap();
        let receipt = l.get_transaction(&journal.id).unwrap();
        assert_eq!(receipt.transaction, journal);
        assert_eq!(receipt.block_number, 1);
        drop(l);

        // Restored once; a second open finds it in the chain files.
        let l = Ledger::open(dir.path(), options).unwrap();
        assert_eq!(l.get_chain_stats().transactions, 1);
        assert!(l.verify_chain().valid);
    }
}
