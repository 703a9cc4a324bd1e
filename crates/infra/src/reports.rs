//! Dashboard figures computed from in-memory record sets.
//!
//! Pure functions: callers load the records (already scoped to what the
//! caller may see) and pass them in. Percentages are decimal and rounded
//! half-to-even.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orbit_core::{AggregateRoot, Money, ProjectId, SoftDelete};
use orbit_invoicing::{Invoice, InvoiceStatus};
use orbit_parties::{Lead, LeadStage, LeadStatus};
use orbit_projects::{Project, ProjectStatus, Task, progress};

/// First day of the month containing `day`.
pub fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

/// First day of the month before the one containing `day`.
pub fn previous_month_start(day: NaiveDate) -> NaiveDate {
    let start = month_start(day);
    start.checked_sub_months(Months::new(1)).unwrap_or(start)
}

fn percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part * Decimal::ONE_HUNDRED / whole
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub revenue_this_month: Money,
    pub revenue_last_month: Money,
    /// 0 when last month had no revenue.
    pub revenue_growth_percent: Decimal,
    /// `total - paid` over sent and overdue invoices.
    pub outstanding_amount: Money,
    pub overdue_invoices: usize,
}

/// Sum of `total_amount` over paid invoices created in `[start, end)`.
pub fn paid_revenue_between<'a>(
    invoices: impl IntoIterator<Item = &'a Invoice>,
    start: NaiveDate,
    end: NaiveDate,
) -> Money {
    invoices
        .into_iter()
        .filter(|i| i.status() == InvoiceStatus::Paid)
        .filter(|i| {
            i.created_at()
                .map(|at| at.date_naive())
                .is_some_and(|d| d >= start && d < end)
        })
        .map(Invoice::total_amount)
        .sum()
}

pub fn financial_summary(invoices: &[Invoice], today: NaiveDate) -> FinancialSummary {
    let this_month = month_start(today);
    let last_month = previous_month_start(today);
    let tomorrow = today.succ_opt().unwrap_or(today);

    let revenue_this_month = paid_revenue_between(invoices, this_month, tomorrow);
    let revenue_last_month = paid_revenue_between(invoices, last_month, this_month);
    let growth = percent(revenue_this_month - revenue_last_month, revenue_last_month);

    let outstanding_amount = invoices
        .iter()
        .filter(|i| i.status().is_outstanding())
        .map(Invoice::remaining_balance)
        .sum();
    let overdue_invoices = invoices
        .iter()
        .filter(|i| i.status() == InvoiceStatus::Overdue)
        .count();

    FinancialSummary {
        revenue_this_month,
        revenue_last_month,
        revenue_growth_percent: growth.round_dp(2),
        outstanding_amount,
        overdue_invoices,
    }
}

/// Mean completion percentage (one decimal) over in-progress projects that
/// have at least one active task. Unlike [`progress`], the per-project
/// figure is not floored before averaging.
pub fn average_project_completion(projects: &[Project], tasks: &[Task]) -> Decimal {
    let mut by_project: BTreeMap<ProjectId, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        if let Some(project_id) = task.project_id() {
            by_project.entry(project_id).or_default().push(task);
        }
    }

    let percentages: Vec<Decimal> = projects
        .iter()
        .filter(|p| p.is_active() && p.status() == ProjectStatus::InProgress)
        .filter_map(|p| {
            let counts = progress(by_project.get(p.id())?.iter().copied());
            (counts.total_tasks > 0).then(|| {
                percent(Decimal::from(counts.completed_tasks), Decimal::from(counts.total_tasks))
            })
        })
        .collect();

    if percentages.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = percentages.iter().sum();
    (total / Decimal::from(percentages.len())).round_dp(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: LeadStage,
    pub count: usize,
    pub value: Money,
    pub avg_score: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// One row per stage, pipeline order, empty stages included.
    pub stages: Vec<StageSummary>,
    pub total_leads: usize,
    pub total_value: Money,
    pub qualified_leads: usize,
    pub converted_leads: usize,
    /// `converted / total * 100`, two decimals.
    pub conversion_rate: Decimal,
    /// Estimated value of leads in qualified, proposal or negotiation.
    pub pipeline_value: Money,
}

/// Pipeline figures over active (non-deleted) leads.
pub fn pipeline_summary<'a>(leads: impl IntoIterator<Item = &'a Lead>) -> PipelineSummary {
    let active: Vec<&Lead> = leads.into_iter().filter(|l| l.is_active()).collect();

    let stages: Vec<StageSummary> = LeadStage::ALL
        .iter()
        .map(|&stage| {
            let in_stage: Vec<&&Lead> = active.iter().filter(|l| l.stage() == stage).collect();
            let count = in_stage.len();
            let value = in_stage.iter().filter_map(|l| l.estimated_value()).sum();
            let score_sum: Decimal = in_stage.iter().map(|l| Decimal::from(l.score())).sum();
            let avg_score = if count == 0 {
                Decimal::ZERO
            } else {
                (score_sum / Decimal::from(count)).round_dp(2)
            };
            StageSummary {
                stage,
                count,
                value,
                avg_score,
            }
        })
        .collect();

    let total_leads = active.len();
    let converted_leads = active
        .iter()
        .filter(|l| l.status() == LeadStatus::Converted)
        .count();
    let qualified_leads = active
        .iter()
        .filter(|l| l.status() == LeadStatus::Qualified)
        .count();
    let pipeline_value = active
        .iter()
        .filter(|l| {
            matches!(
                l.stage(),
                LeadStage::Qualified | LeadStage::Proposal | LeadStage::Negotiation
            )
        })
        .filter_map(|l| l.estimated_value())
        .sum();

    PipelineSummary {
        total_value: stages.iter().map(|s| s.value).sum(),
        stages,
        total_leads,
        qualified_leads,
        converted_leads,
        conversion_rate: percent(Decimal::from(converted_leads), Decimal::from(total_leads)).round_dp(2),
        pipeline_value,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`.
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub revenue: Money,
    pub invoice_count: usize,
}

/// Paid revenue grouped by creation month, for invoices created in
/// `[start, end]`. Months without revenue are omitted.
pub fn monthly_revenue(invoices: &[Invoice], start: NaiveDate, end: NaiveDate) -> Vec<MonthlyRevenue> {
    let mut months: BTreeMap<(i32, u32), (Money, usize)> = BTreeMap::new();
    for invoice in invoices.iter().filter(|i| i.status() == InvoiceStatus::Paid) {
        let Some(created) = invoice.created_at().map(|at| at.date_naive()) else {
            continue;
        };
        if created < start || created > end {
            continue;
        }
        let slot = months.entry((created.year(), created.month())).or_default();
        slot.0 += invoice.total_amount();
        slot.1 += 1;
    }

    months
        .into_iter()
        .map(|((year, month), (revenue, invoice_count))| MonthlyRevenue {
            label: format!("{year}-{month:02}"),
            year,
            month,
            revenue,
            invoice_count,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodTotal {
    /// `"unspecified"` when the payment carried no method.
    pub method: String,
    pub total: Money,
    pub count: usize,
}

/// Payments dated in `[start, end]`, grouped by method (sorted by name).
pub fn payment_methods(invoices: &[Invoice], start: NaiveDate, end: NaiveDate) -> Vec<PaymentMethodTotal> {
    let mut methods: BTreeMap<String, (Money, usize)> = BTreeMap::new();
    let payments = invoices
        .iter()
        .flat_map(|i| i.payments())
        .filter(|p| p.payment_date >= start && p.payment_date <= end);
    for payment in payments {
        let method = payment.method.clone().unwrap_or_else(|| "unspecified".to_string());
        let slot = methods.entry(method).or_default();
        slot.0 += payment.amount;
        slot.1 += 1;
    }

    methods
        .into_iter()
        .map(|(method, (total, count))| PaymentMethodTotal { method, total, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use orbit_core::{Actor, Aggregate, ClientId, InvoiceId, PaymentId, Priority, UserId};
    use orbit_invoicing::{
        CreateInvoice, InvoiceCommand, MarkOverdue, NewInvoiceItem, RecordPayment, SendInvoice,
    };
    use orbit_parties::{ConvertLead, CreateLead, LeadChanges, LeadCommand, UpdateLead};
    use orbit_projects::{
        CreateProject, CreateTask, DeleteTask, ProjectChanges, ProjectCommand, TaskCommand,
        TaskStatus, UpdateProject,
    };
    use rust_decimal_macros::dec;

    fn actor() -> Actor {
        Actor::new(UserId::new(), "Fin Ance")
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn invoice(total: Money, created: DateTime<Utc>) -> Invoice {
        let id = InvoiceId::new();
        let mut invoice = Invoice::empty(id);
        invoice
            .execute(&InvoiceCommand::CreateInvoice(CreateInvoice {
                invoice_id: id,
                invoice_number: format!("INV-{}", id),
                client_id: ClientId::new(),
                project_id: None,
                issue_date: created.date_naive(),
                due_date: created.date_naive() + Duration::days(30),
                items: vec![NewInvoiceItem::new("Consulting", dec!(1), total)],
                tax_amount: Decimal::ZERO,
                discount_amount: Decimal::ZERO,
                currency: "USD".to_string(),
                payment_terms: None,
                notes: None,
                actor: actor(),
                occurred_at: created,
            }))
            .unwrap();
        invoice
    }

    fn sent(mut invoice: Invoice) -> Invoice {
        let at = invoice.created_at().unwrap();
        invoice
            .execute(&InvoiceCommand::SendInvoice(SendInvoice { actor: actor(), occurred_at: at }))
            .unwrap();
        invoice
    }

    fn pay(mut invoice: Invoice, amount: Money, method: Option<&str>, on: NaiveDate) -> Invoice {
        invoice
            .execute(&InvoiceCommand::RecordPayment(RecordPayment {
                payment_id: PaymentId::new(),
                amount,
                currency: None,
                method: method.map(str::to_string),
                payment_date: on,
                reference_number: None,
                notes: None,
                actor: actor(),
                occurred_at: at(2024, 3, 20),
            }))
            .unwrap();
        invoice
    }

    fn paid(total: Money, created: DateTime<Utc>) -> Invoice {
        pay(sent(invoice(total, created)), total, Some("bank_transfer"), created.date_naive())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn month_boundaries() {
        assert_eq!(month_start(today()), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(previous_month_start(today()), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        let jan = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(previous_month_start(jan), NaiveDate::from_ymd_opt(2023, 12, 1).unwrap());
    }

    #[test]
    fn financial_summary_splits_months_and_outstanding() {
        let mut overdue = sent(invoice(dec!(300), at(2024, 1, 5)));
        overdue
            .execute(&InvoiceCommand::MarkOverdue(MarkOverdue { today: today(), occurred_at: at(2024, 3, 15) }))
            .unwrap();
        let partially_paid = pay(sent(invoice(dec!(200), at(2024, 3, 2))), dec!(50), None, today());

        let invoices = vec![
            paid(dec!(150.50), at(2024, 3, 3)),
            paid(dec!(100), at(2024, 2, 10)),
            paid(dec!(999), at(2024, 1, 10)),
            invoice(dec!(75), at(2024, 3, 4)),
            overdue,
            partially_paid,
        ];

        let summary = financial_summary(&invoices, today());
        assert_eq!(summary.revenue_this_month, dec!(150.50));
        assert_eq!(summary.revenue_last_month, dec!(100));
        assert_eq!(summary.revenue_growth_percent, dec!(50.50));
        assert_eq!(summary.outstanding_amount, dec!(450));
        assert_eq!(summary.overdue_invoices, 1);
    }

    #[test]
    fn growth_is_zero_without_last_month_revenue() {
        let invoices = vec![paid(dec!(10), at(2024, 3, 1))];
        assert_eq!(financial_summary(&invoices, today()).revenue_growth_percent, Decimal::ZERO);
    }

    fn project(status: ProjectStatus) -> Project {
        let cmd = CreateProject {
            project_id: ProjectId::new(),
            client_id: ClientId::new(),
            name: "Portal".to_string(),
            description: None,
            priority: Priority::Medium,
            start_date: None,
            end_date: None,
            budget: None,
            actor: actor(),
            occurred_at: at(2024, 1, 1),
        };
        let mut project = Project::empty(cmd.project_id);
        project.execute(&ProjectCommand::CreateProject(cmd)).unwrap();
        if status != ProjectStatus::Planning {
            project
                .execute(&ProjectCommand::UpdateProject(UpdateProject {
                    changes: ProjectChanges { status: Some(status), ..Default::default() },
                    actor: actor(),
                    occurred_at: at(2024, 1, 2),
                }))
                .unwrap();
        }
        project
    }

    fn task(project: &Project, status: TaskStatus) -> Task {
        let cmd = CreateTask {
            task_id: orbit_core::TaskId::new(),
            project_id: *project.id(),
            title: "Task".to_string(),
            description: None,
            status,
            priority: Priority::Low,
            assigned_to: None,
            estimated_hours: None,
            due_date: None,
            actor: actor(),
            occurred_at: at(2024, 1, 3),
        };
        let mut task = Task::empty(cmd.task_id);
        task.execute(&TaskCommand::CreateTask(cmd)).unwrap();
        task
    }

    #[test]
    fn average_completion_over_in_progress_projects_with_tasks() {
        let a = project(ProjectStatus::InProgress);
        let b = project(ProjectStatus::InProgress);
        let empty = project(ProjectStatus::InProgress);
        let planning = project(ProjectStatus::Planning);

        let mut removed = task(&b, TaskStatus::Completed);
        removed
            .execute(&TaskCommand::DeleteTask(DeleteTask { actor: actor(), occurred_at: at(2024, 1, 4) }))
            .unwrap();

        let tasks = vec![
            task(&a, TaskStatus::Completed),
            task(&a, TaskStatus::Todo),
            task(&a, TaskStatus::Todo),
            task(&b, TaskStatus::Completed),
            task(&b, TaskStatus::Completed),
            task(&b, TaskStatus::Review),
            removed,
            task(&planning, TaskStatus::Completed),
        ];
        let projects = vec![a, b, empty, planning];

        // (33.33.. + 66.66..) / 2
        assert_eq!(average_project_completion(&projects, &tasks), dec!(50.0));
    }

    #[test]
    fn average_completion_without_projects_is_zero() {
        assert_eq!(average_project_completion(&[], &[]), Decimal::ZERO);
    }

    fn lead(stage: LeadStage, value: Option<Money>, score: u8) -> Lead {
        let mut cmd = CreateLead::new("Ada", "Lovelace", actor(), at(2024, 2, 1));
        cmd.estimated_value = value;
        cmd.score = score;
        let mut lead = Lead::empty(cmd.lead_id);
        lead.execute(&LeadCommand::CreateLead(cmd)).unwrap();
        if stage != LeadStage::Prospect {
            lead.execute(&LeadCommand::UpdateLead(UpdateLead {
                changes: LeadChanges { stage: Some(stage), ..Default::default() },
                actor: actor(),
                occurred_at: at(2024, 2, 2),
            }))
            .unwrap();
        }
        lead
    }

    #[test]
    fn pipeline_lists_every_stage_in_order() {
        let mut converted = lead(LeadStage::Negotiation, Some(dec!(1000)), 90);
        converted
            .execute(&LeadCommand::ConvertLead(ConvertLead {
                client_id: ClientId::new(),
                actor: actor(),
                occurred_at: at(2024, 2, 3),
            }))
            .unwrap();

        let leads = vec![
            lead(LeadStage::Prospect, Some(dec!(100)), 10),
            lead(LeadStage::Prospect, None, 21),
            lead(LeadStage::Qualified, Some(dec!(500)), 60),
            lead(LeadStage::Proposal, Some(dec!(250)), 70),
            converted,
        ];

        let summary = pipeline_summary(&leads);
        let stages: Vec<LeadStage> = summary.stages.iter().map(|s| s.stage).collect();
        assert_eq!(stages, LeadStage::ALL.to_vec());

        let prospect = &summary.stages[0];
        assert_eq!((prospect.count, prospect.value, prospect.avg_score), (2, dec!(100), dec!(15.50)));
        assert_eq!(summary.stages[3].count, 0);
        assert_eq!(summary.stages[4].count, 1);

        assert_eq!(summary.total_leads, 5);
        assert_eq!(summary.total_value, dec!(1850));
        assert_eq!(summary.converted_leads, 1);
        assert_eq!(summary.conversion_rate, dec!(20));
        assert_eq!(summary.pipeline_value, dec!(750));
    }

    #[test]
    fn empty_pipeline_has_zero_rate() {
        let summary = pipeline_summary(&Vec::<Lead>::new());
        assert_eq!(summary.total_leads, 0);
        assert_eq!(summary.conversion_rate, Decimal::ZERO);
        assert_eq!(summary.stages.len(), LeadStage::ALL.len());
    }

    #[test]
    fn monthly_revenue_groups_paid_invoices() {
        let invoices = vec![
            paid(dec!(100), at(2024, 1, 10)),
            paid(dec!(50), at(2024, 1, 20)),
            paid(dec!(70), at(2024, 3, 1)),
            invoice(dec!(999), at(2024, 2, 1)),
        ];
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let months = monthly_revenue(&invoices, start, today());
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].label, "2024-01");
        assert_eq!((months[0].revenue, months[0].invoice_count), (dec!(150), 2));
        assert_eq!(months[1].label, "2024-03");
    }

    #[test]
    fn payment_methods_default_to_unspecified() {
        let on = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let invoices = vec![
            pay(sent(invoice(dec!(100), at(2024, 3, 1))), dec!(40), None, on),
            paid(dec!(60), at(2024, 3, 2)),
        ];
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let methods = payment_methods(&invoices, start, today());
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].method, "bank_transfer");
        assert_eq!((methods[1].method.as_str(), methods[1].total, methods[1].count), ("unspecified", dec!(40), 1));
    }
}
