//! Service assembly: one store, one audit log, every governance component
//! wired to both.

use std::sync::Arc;

use crate::audit::AuditLog;
use crate::collab::{DisabledMl, DisabledWorkflow, MlScoring, RateAdvisor, WorkflowDispatch};
use crate::config::GovernanceTunables;
use crate::database::GovernanceStore;
use crate::governance::{
    DecayScheduler, GovernanceOperations, NoSpamAuditor, NoSpamPolicy, SettingsService,
    TicketWorkflow, VisibilityStateMachine,
};
use crate::liquidity::LiquidityService;
use crate::reputation::ReputationManager;

#[derive(Clone)]
pub struct GovernanceEngine {
    pub store: Arc<dyn GovernanceStore>,
    pub audit: AuditLog,
    pub settings: SettingsService,
    pub machine: VisibilityStateMachine,
    pub tickets: TicketWorkflow,
    pub decay: DecayScheduler,
    pub no_spam: NoSpamAuditor,
    pub operations: GovernanceOperations,
    pub reputation: Arc<ReputationManager>,
    pub liquidity: LiquidityService,
    pub rates: RateAdvisor,
}

impl GovernanceEngine {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        tunables: GovernanceTunables,
        ml: Arc<dyn MlScoring>,
        workflow: Arc<dyn WorkflowDispatch>,
    ) -> Self {
        let audit = AuditLog::new(store.clone(), tunables.audit_max_limit);
        let settings =
            SettingsService::new(store.clone(), audit.clone(), tunables.default_expiry_days);
        let machine = VisibilityStateMachine::new(store.clone(), audit.clone());

        Self {
            tickets: TicketWorkflow::new(store.clone(), machine.clone(), settings.clone()),
            decay: DecayScheduler::new(
                store.clone(),
                audit.clone(),
                machine.clone(),
                settings.clone(),
                tunables.expiry_batch_limit,
            ),
            no_spam: NoSpamAuditor::new(
                store.clone(),
                machine.clone(),
                settings.clone(),
                NoSpamPolicy {
                    window_days: tunables.window_days,
                    max_attempts_without_booking: tunables.max_attempts_without_booking,
                },
            ),
            operations: GovernanceOperations::new(
                store.clone(),
                machine.clone(),
                settings.clone(),
                tunables.bulk_reclaim_max,
            ),
            reputation: Arc::new(ReputationManager::new(store.clone(), audit.clone())),
            liquidity: LiquidityService::new(store.clone(), workflow, tunables.gap_threshold),
            rates: RateAdvisor::new(ml, store.clone(), settings.clone()),
            store,
            audit,
            settings,
            machine,
        }
    }

    /// Engine with no external collaborators configured.
    pub fn standalone(store: Arc<dyn GovernanceStore>, tunables: GovernanceTunables) -> Self {
        Self::new(store, tunables, Arc::new(DisabledMl), Arc::new(DisabledWorkflow))
    }
}
