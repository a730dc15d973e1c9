//! Transaction coordinator
//!
//! The coordinator owns every site, every live transaction and the queue of
//! deferred operations. Processing one command is a fixed pipeline:
//!
//! ```text
//! route -> drain queue -> detect deadlock -> (victim aborted? drain again) -> tick
//! ```
//!
//! Lock conflicts never surface as errors. An operation that cannot proceed
//! stays queued and is retried on every later drain until it succeeds or its
//! transaction ends.
//!
//! The clock is logical: one tick per processed command. Rejected commands
//! still consume a tick; blank and comment lines do not.

use crate::command::{parse_line, Command};
use crate::config::SimConfig;
use crate::event::{AbortReason, Event, SiteDump};
use crate::operation::{OperationKind, PendingOperation};
use crate::site::Site;
use crate::transaction::Transaction;
use repcc_concurrency::{LockMode, WaitForGraph};
use repcc_core::{Error, Placement, Result, SiteId, Timestamp, TxnId, Value, VarId};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Replicated concurrency-control coordinator
#[derive(Debug, Clone)]
pub struct Coordinator {
    placement: Placement,
    /// In site id order
    sites: Vec<Site>,
    transactions: BTreeMap<TxnId, Transaction>,
    queue: Vec<PendingOperation>,
    clock: Timestamp,
    total_started: u64,
    total_committed: u64,
    total_aborted: u64,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::with_placement(Placement::default())
    }
}

impl Coordinator {
    /// Create a coordinator for the cluster described by `config`
    pub fn new(config: &SimConfig) -> Self {
        Self::with_placement(config.placement())
    }

    /// Create a coordinator with every site up and every variable at its
    /// initial value
    pub fn with_placement(placement: Placement) -> Self {
        let sites = placement
            .sites()
            .map(|id| Site::new(id, &placement))
            .collect();
        Self {
            placement,
            sites,
            transactions: BTreeMap::new(),
            queue: Vec::new(),
            clock: Timestamp::ZERO,
            total_started: 0,
            total_committed: 0,
            total_aborted: 0,
        }
    }

    /// Current logical time
    pub fn clock(&self) -> Timestamp {
        self.clock
    }

    /// Variable placement
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Site `id`, if it exists
    pub fn site(&self, id: SiteId) -> Option<&Site> {
        self.sites.iter().find(|site| site.id() == id)
    }

    /// Every site, by id
    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.sites.iter()
    }

    /// Live transaction `id`
    pub fn transaction(&self, id: &TxnId) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    /// Every live transaction, by id
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values()
    }

    /// Operations still waiting, in arrival order
    pub fn pending_operations(&self) -> &[PendingOperation] {
        &self.queue
    }

    /// Counters over the coordinator's lifetime
    pub fn metrics(&self) -> TransactionMetrics {
        TransactionMetrics {
            active_count: self.transactions.len() as u64,
            total_started: self.total_started,
            total_committed: self.total_committed,
            total_aborted: self.total_aborted,
        }
    }

    /// Committed values at every site, including down sites
    pub fn dump(&self) -> Event {
        Event::Dump {
            sites: self
                .sites
                .iter()
                .map(|site| SiteDump {
                    site: site.id(),
                    up: site.is_up(),
                    values: site.committed_values(),
                })
                .collect(),
        }
    }

    /// Parse and process one line of input
    ///
    /// Blank and comment lines yield no events and leave the clock alone.
    ///
    /// # Errors
    ///
    /// `Error::Parse` for a malformed line (the clock does not advance), or
    /// any error `process_command` returns.
    pub fn process_line(&mut self, line: &str) -> Result<Vec<Event>> {
        match parse_line(line)? {
            Some(command) => self.process_command(command),
            None => Ok(Vec::new()),
        }
    }

    /// Process one command and advance the clock
    ///
    /// # Errors
    ///
    /// A protocol violation (duplicate or unknown transaction, unknown site
    /// or variable, write by a read-only transaction, `end` while waiting
    /// for a lock, failing a down site, recovering an up site). The command
    /// is dropped: no queue drain or deadlock check runs, but the tick is
    /// still consumed.
    pub fn process_command(&mut self, command: Command) -> Result<Vec<Event>> {
        debug!(target: "repcc::txn", at = %self.clock, command = %command, "Processing command");
        let mut events = Vec::new();

        if let Err(e) = self.route(command, &mut events) {
            warn!(target: "repcc::txn", at = %self.clock, error = %e, "Command rejected");
            self.tick();
            return Err(e);
        }

        self.drain_queue(&mut events);
        if self.detect_and_break_deadlock(&mut events) {
            self.drain_queue(&mut events);
        }
        self.tick();
        Ok(events)
    }

    fn tick(&mut self) {
        self.clock = self.clock.next();
    }

    fn route(&mut self, command: Command, events: &mut Vec<Event>) -> Result<()> {
        match command {
            Command::Begin(txn) => self.begin(txn, events),
            Command::BeginReadOnly(txn) => self.begin_read_only(txn, events),
            Command::Read { txn, var } => {
                self.live(&txn)?;
                self.check_variable(var)?;
                debug!(target: "repcc::txn", txn = %txn, var = %var, "Read queued");
                self.queue.push(PendingOperation::read(txn, var));
                Ok(())
            }
            Command::Write { txn, var, value } => {
                if self.live(&txn)?.is_read_only() {
                    return Err(Error::ReadOnlyWrite(txn));
                }
                self.check_variable(var)?;
                debug!(target: "repcc::txn", txn = %txn, var = %var, value, "Write queued");
                self.queue.push(PendingOperation::write(txn, var, value));
                Ok(())
            }
            Command::Dump => {
                events.push(self.dump());
                Ok(())
            }
            Command::End(txn) => self.end(txn, events),
            Command::Fail(site) => self.fail(site, events),
            Command::Recover(site) => self.recover(site, events),
        }
    }

    fn live(&self, txn: &TxnId) -> Result<&Transaction> {
        self.transactions
            .get(txn)
            .ok_or_else(|| Error::UnknownTransaction(txn.clone()))
    }

    fn check_variable(&self, var: VarId) -> Result<()> {
        if self.placement.contains_variable(var) {
            Ok(())
        } else {
            Err(Error::UnknownVariable(var))
        }
    }

    fn site_mut(&mut self, id: SiteId) -> Result<&mut Site> {
        self.sites
            .iter_mut()
            .find(|site| site.id() == id)
            .ok_or(Error::UnknownSite(id))
    }

    // ========================================================================
    // Transaction lifecycle
    // ========================================================================

    fn begin(&mut self, txn: TxnId, events: &mut Vec<Event>) -> Result<()> {
        if self.transactions.contains_key(&txn) {
            return Err(Error::DuplicateTransaction(txn));
        }
        info!(target: "repcc::txn", txn = %txn, at = %self.clock, "Transaction started");
        self.transactions
            .insert(txn.clone(), Transaction::read_write(txn.clone(), self.clock));
        self.total_started += 1;
        events.push(Event::Began {
            txn,
            read_only: false,
            at: self.clock,
        });
        Ok(())
    }

    fn begin_read_only(&mut self, txn: TxnId, events: &mut Vec<Event>) -> Result<()> {
        if self.transactions.contains_key(&txn) {
            return Err(Error::DuplicateTransaction(txn));
        }
        let snapshot = self.read_snapshot();
        info!(
            target: "repcc::txn",
            txn = %txn,
            at = %self.clock,
            variables = snapshot.len(),
            "Read-only transaction started"
        );
        self.transactions.insert(
            txn.clone(),
            Transaction::read_only(txn.clone(), self.clock, snapshot),
        );
        self.total_started += 1;
        events.push(Event::Began {
            txn,
            read_only: true,
            at: self.clock,
        });
        Ok(())
    }

    /// Union of every up site's snapshot; the lowest site id wins a conflict
    fn read_snapshot(&self) -> BTreeMap<VarId, Value> {
        let mut snapshot = BTreeMap::new();
        for site in self.sites.iter().filter(|site| site.is_up()) {
            for (var, value) in site.snapshot() {
                snapshot.entry(var).or_insert(value);
            }
        }
        snapshot
    }

    /// Commit, or abort if a site the transaction touched has failed
    ///
    /// A doomed transaction aborts whatever it still has queued. A healthy
    /// one is refused while it waits in some lock queue; operations that
    /// wait without a lock request (every copy down or unreadable) are
    /// dropped and the transaction commits.
    fn end(&mut self, txn: TxnId, events: &mut Vec<Event>) -> Result<()> {
        if !self.live(&txn)?.can_commit() {
            self.abort(&txn, AbortReason::SiteFailure, events);
            return Ok(());
        }

        let pending = self.queue.iter().filter(|op| op.txn == txn).count();
        if pending == 0 {
            return self.commit(&txn, events);
        }
        if self.sites.iter().any(|site| site.has_pending_request(&txn)) {
            return Err(Error::OperationsPending { txn, pending });
        }

        warn!(target: "repcc::txn", txn = %txn, dropped = pending, "Queued operations dropped at commit");
        self.queue.retain(|op| op.txn != txn);
        self.commit(&txn, events)
    }

    fn commit(&mut self, txn: &TxnId, events: &mut Vec<Event>) -> Result<()> {
        if let Some(site) = self.sites.iter().find(|site| site.has_pending_request(txn)) {
            return Err(Error::InvariantViolation(format!(
                "{} reached commit while still queued at site {}",
                txn,
                site.id()
            )));
        }

        let at = self.clock;
        for site in &mut self.sites {
            site.commit(txn, at)?;
        }
        self.transactions.remove(txn);
        self.total_committed += 1;
        info!(target: "repcc::txn", txn = %txn, at = %at, "Transaction committed");
        events.push(Event::Committed {
            txn: txn.clone(),
            at,
        });
        Ok(())
    }

    fn abort(&mut self, txn: &TxnId, reason: AbortReason, events: &mut Vec<Event>) {
        for site in &mut self.sites {
            site.abort(txn);
        }
        self.queue.retain(|op| &op.txn != txn);
        self.transactions.remove(txn);
        self.total_aborted += 1;
        info!(target: "repcc::txn", txn = %txn, reason = ?reason, "Transaction aborted");
        events.push(Event::Aborted {
            txn: txn.clone(),
            reason,
        });
    }

    // ========================================================================
    // Site failure
    // ========================================================================

    fn fail(&mut self, site: SiteId, events: &mut Vec<Event>) -> Result<()> {
        let target = self.site_mut(site)?;
        if !target.is_up() {
            return Err(Error::SiteAlreadyDown(site));
        }
        target.fail();

        let mut doomed = Vec::new();
        for txn in self.transactions.values_mut() {
            if !txn.is_read_only() && txn.can_commit() && txn.has_accessed(site) {
                txn.doom();
                doomed.push(txn.id().clone());
            }
        }
        if !doomed.is_empty() {
            info!(target: "repcc::txn", site = %site, doomed = doomed.len(), "Transactions doomed by site failure");
        }
        events.push(Event::SiteFailed { site, doomed });
        Ok(())
    }

    fn recover(&mut self, site: SiteId, events: &mut Vec<Event>) -> Result<()> {
        let at = self.clock;
        let target = self.site_mut(site)?;
        if target.is_up() {
            return Err(Error::SiteAlreadyUp(site));
        }
        target.recover(at);
        events.push(Event::SiteRecovered { site, at });
        Ok(())
    }

    // ========================================================================
    // Deferred operations
    // ========================================================================

    /// Attempt every queued operation once, in arrival order
    fn drain_queue(&mut self, events: &mut Vec<Event>) {
        let queue = std::mem::take(&mut self.queue);
        let mut remaining = Vec::with_capacity(queue.len());

        for mut op in queue {
            if !self.transactions.contains_key(&op.txn) {
                continue;
            }
            let done = match op.kind {
                OperationKind::Read => self.attempt_read(&op, events),
                OperationKind::Write(value) => self.attempt_write(&op, value, events),
            };
            op.first_attempt = false;
            if !done {
                remaining.push(op);
            }
        }

        self.queue = remaining;
        if !self.queue.is_empty() {
            debug!(
                target: "repcc::txn",
                pending = self.queue.len(),
                head = %self.queue[0],
                "Operations still waiting"
            );
        }
    }

    /// Returns whether the operation left the queue
    fn attempt_read(&mut self, op: &PendingOperation, events: &mut Vec<Event>) -> bool {
        let Some(txn) = self.transactions.get(&op.txn) else {
            return true;
        };

        if txn.is_read_only() {
            let event = match txn.snapshot_value(op.var) {
                Some(value) => Event::Read {
                    txn: op.txn.clone(),
                    var: op.var,
                    value,
                    site: None,
                },
                None => {
                    debug!(target: "repcc::txn", txn = %op.txn, var = %op.var, "Snapshot has no committed copy");
                    Event::ReadFailed {
                        txn: op.txn.clone(),
                        var: op.var,
                    }
                }
            };
            events.push(event);
            return true;
        }

        let mut served = None;
        for site in &mut self.sites {
            if !site.is_up() || !site.has_variable(op.var) {
                continue;
            }
            if let Some(value) = site.read(&op.txn, op.var, op.first_attempt) {
                served = Some((site.id(), value));
                break;
            }
        }

        let Some((site, value)) = served else {
            return false;
        };
        self.withdraw_everywhere(&op.txn, op.var, LockMode::Shared);
        if let Some(txn) = self.transactions.get_mut(&op.txn) {
            txn.record_access(site);
        }
        debug!(target: "repcc::txn", txn = %op.txn, var = %op.var, site = %site, value, "Read served");
        events.push(Event::Read {
            txn: op.txn.clone(),
            var: op.var,
            value,
            site: Some(site),
        });
        true
    }

    /// Available copies: every up site holding the variable must grant
    fn attempt_write(&mut self, op: &PendingOperation, value: Value, events: &mut Vec<Event>) -> bool {
        let holders: Vec<usize> = self
            .sites
            .iter()
            .enumerate()
            .filter(|(_, site)| site.is_up() && site.has_variable(op.var))
            .map(|(index, _)| index)
            .collect();
        if holders.is_empty() {
            return false;
        }

        // Ask every holder so each one registers the request.
        let mut granted = true;
        for &index in &holders {
            if !self.sites[index].get_write_lock(&op.txn, op.var, op.first_attempt) {
                granted = false;
            }
        }
        if !granted {
            return false;
        }

        let mut sites = Vec::with_capacity(holders.len());
        for &index in &holders {
            let site = &mut self.sites[index];
            if site.write(&op.txn, op.var, value) {
                sites.push(site.id());
            }
        }
        self.withdraw_everywhere(&op.txn, op.var, LockMode::Exclusive);
        if let Some(txn) = self.transactions.get_mut(&op.txn) {
            for &site in &sites {
                txn.record_access(site);
            }
        }
        debug!(target: "repcc::txn", txn = %op.txn, var = %op.var, value, copies = sites.len(), "Write staged");
        events.push(Event::Wrote {
            txn: op.txn.clone(),
            var: op.var,
            value,
            sites,
        });
        true
    }

    fn withdraw_everywhere(&mut self, txn: &TxnId, var: VarId, mode: LockMode) {
        for site in &mut self.sites {
            site.withdraw_request(txn, var, mode);
        }
    }

    // ========================================================================
    // Deadlock
    // ========================================================================

    /// Abort at most one deadlock victim; returns whether one was aborted
    fn detect_and_break_deadlock(&mut self, events: &mut Vec<Event>) -> bool {
        let mut graph = WaitForGraph::new();
        for site in self.sites.iter().filter(|site| site.is_up()) {
            graph.extend(site.wait_edges());
        }
        if graph.is_empty() {
            return false;
        }

        let transactions = &self.transactions;
        let Some(info) = graph.find_victim(|txn| transactions.get(txn).map(Transaction::start))
        else {
            return false;
        };

        info!(
            target: "repcc::deadlock",
            victim = %info.victim,
            members = info.members.len(),
            "Aborting deadlock victim"
        );
        let victim = info.victim.clone();
        events.push(Event::DeadlockDetected {
            members: info.members,
            victim: info.victim,
        });
        self.abort(&victim, AbortReason::Deadlock, events);
        true
    }
}

/// Transaction counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionMetrics {
    /// Number of currently live transactions
    pub active_count: u64,
    /// Total number of transactions started
    pub total_started: u64,
    /// Total number of transactions committed
    pub total_committed: u64,
    /// Total number of transactions aborted
    pub total_aborted: u64,
}

impl TransactionMetrics {
    /// Total transactions that ended (committed + aborted)
    pub fn total_completed(&self) -> u64 {
        self.total_committed + self.total_aborted
    }

    /// Commit success rate (committed / started)
    pub fn commit_rate(&self) -> f64 {
        if self.total_started > 0 {
            self.total_committed as f64 / self.total_started as f64
        } else {
            0.0
        }
    }
}
