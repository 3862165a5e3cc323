use std::sync::Arc;

use crate::config::Config;
use crate::gateway::{PaymentGateway, SmsGateway};
use crate::model::payroll::PayrollPolicy;
use crate::service::disbursement::DisbursementExecutor;
use crate::service::notification::Notifier;
use crate::service::workflow::PaymentWorkflow;
use crate::store::PayrollStore;

/// Shared handles every request handler works through.
pub struct AppState {
    pub store: Arc<dyn PayrollStore>,
    pub workflow: PaymentWorkflow,
    pub notifier: Notifier,
    pub policy: PayrollPolicy,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn PayrollStore>,
        gateway: Arc<dyn PaymentGateway>,
        sms: Arc<dyn SmsGateway>,
    ) -> Self {
        let notifier = Notifier::new(sms, config.notify_retry());
        let executor = Arc::new(DisbursementExecutor::new(
            gateway,
            notifier.clone(),
            config.disbursement_delay,
        ));
        Self {
            workflow: PaymentWorkflow::new(store.clone(), executor),
            store,
            notifier,
            policy: config.payroll_policy(),
        }
    }
}
