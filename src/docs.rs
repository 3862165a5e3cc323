use crate::api::employee::{EmployeeListResponse, EmployeeQuery};
use crate::api::payment::{ApproveBody, BulkApproveBody, RejectBody};
use crate::api::sms::BulkSmsBody;
use crate::api::statutory::{PreviewRequest, PreviewResponse};
use crate::model::employee::Employee;
use crate::model::payment_request::{Disbursee, DisbursementSummary, PayeeOutcome, PaymentStatus};
use crate::model::payroll::PayrollLine;
use crate::service::notification::{BulkSmsSummary, SmsDelivery, SmsMessage};
use crate::service::payroll_batch::{PayrollBatch, PayrollTotals};
use crate::service::workflow::{BulkApprovalItem, BulkApprovalReport};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MFI Payroll API",
        version = "1.0.0",
        description = r#"
## Microfinance Payroll & Disbursement

Computes monthly payroll under Kenyan statutory rules and pays net salaries
to employee M-Pesa wallets through a maker-checker approval workflow.

### 🔹 Key Features
- **Statutory Settings**
  - Versioned PAYE, NSSF, NHIF/SHIF and housing levy configuration
- **Payroll**
  - Per-period batches with totals and negative net pay flags
- **Payments**
  - Queue, approve, reject and bulk-approve disbursement requests
- **SMS**
  - Payment confirmations, bulk messages and balance lookup

### 🔐 Security
Every endpoint under `/api` expects a **JWT Bearer** token.
Approvals need a checker, admin or disbursement officer, and nobody approves
their own request.
"#,
    ),
    paths(
        crate::api::statutory::get_settings,
        crate::api::statutory::settings_history,
        crate::api::statutory::save_settings,
        crate::api::statutory::preview,

        crate::api::employee::list_employees,
        crate::api::employee::get_employee,

        crate::api::payroll::payroll_batch,
        crate::api::payroll::employee_payroll,

        crate::api::payment::create_payment,
        crate::api::payment::list_payments,
        crate::api::payment::get_payment,
        crate::api::payment::approve_payment,
        crate::api::payment::reject_payment,
        crate::api::payment::bulk_approve,
        crate::api::payment::clear_pending,

        crate::api::sms::sms_balance,
        crate::api::sms::send_bulk_sms
    ),
    components(
        schemas(
            Employee,
            EmployeeQuery,
            EmployeeListResponse,
            PayrollLine,
            PayrollTotals,
            PayrollBatch,
            PreviewRequest,
            PreviewResponse,
            PaymentStatus,
            Disbursee,
            PayeeOutcome,
            DisbursementSummary,
            ApproveBody,
            RejectBody,
            BulkApproveBody,
            BulkApprovalItem,
            BulkApprovalReport,
            SmsMessage,
            SmsDelivery,
            BulkSmsSummary,
            BulkSmsBody
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Statutory", description = "Statutory deduction settings"),
        (name = "Employee", description = "Employee directory"),
        (name = "Payroll", description = "Payroll computation"),
        (name = "Payments", description = "Maker-checker disbursement workflow"),
        (name = "SMS", description = "SMS gateway"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
