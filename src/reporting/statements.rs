use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{
    breakdown::{percent_of, percentages},
    series::bucket_by_month,
};

// Profit and loss

#[derive(Debug, Clone)]
pub struct ProfitAndLossInput {
    pub revenue: Decimal,
    pub cost_of_purchases: Decimal,
    pub expenses_by_category: Vec<(String, Decimal)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryAmount {
    pub category: String,
    pub amount: Decimal,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfitAndLoss {
    pub revenue: Decimal,
    pub cost_of_purchases: Decimal,
    pub gross_profit: Decimal,
    pub gross_margin: Decimal,
    pub expenses: Vec<CategoryAmount>,
    pub total_expenses: Decimal,
    pub net_profit: Decimal,
    pub net_margin: Decimal,
}

pub fn category_shares(rows: Vec<(String, Decimal)>) -> Vec<CategoryAmount> {
    let amounts: Vec<Decimal> = rows.iter().map(|(_, amount)| *amount).collect();
    rows.into_iter()
        .zip(percentages(&amounts))
        .map(|((category, amount), percentage)| CategoryAmount {
            category,
            amount,
            percentage,
        })
        .collect()
}

pub fn profit_and_loss(input: ProfitAndLossInput) -> ProfitAndLoss {
    let gross_profit = input.revenue - input.cost_of_purchases;
    let total_expenses: Decimal = input.expenses_by_category.iter().map(|(_, a)| *a).sum();
    let net_profit = gross_profit - total_expenses;

    ProfitAndLoss {
        revenue: input.revenue,
        cost_of_purchases: input.cost_of_purchases,
        gross_profit,
        gross_margin: percent_of(gross_profit, input.revenue),
        expenses: category_shares(input.expenses_by_category),
        total_expenses,
        net_profit,
        net_margin: percent_of(net_profit, input.revenue),
    }
}

// Cash flow

#[derive(Debug, Clone)]
pub struct CashFlowInput {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub receipts: Vec<(NaiveDate, Decimal)>,
    pub supplier_payments: Vec<(NaiveDate, Decimal)>,
    pub expense_payments: Vec<(NaiveDate, Decimal)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashFlowMonth {
    pub month: String,
    pub label: String,
    pub inflow: Decimal,
    pub outflow: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashFlow {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub total_inflow: Decimal,
    pub supplier_payments: Decimal,
    pub expense_payments: Decimal,
    pub total_outflow: Decimal,
    pub net_cash_flow: Decimal,
    pub months: Vec<CashFlowMonth>,
}

pub fn cash_flow(input: CashFlowInput) -> CashFlow {
    let inflow = bucket_by_month(input.from, input.to, &input.receipts);
    let supplier = bucket_by_month(input.from, input.to, &input.supplier_payments);
    let expense = bucket_by_month(input.from, input.to, &input.expense_payments);

    let months: Vec<CashFlowMonth> = inflow
        .into_iter()
        .zip(supplier)
        .zip(expense)
        .map(|((inflow, supplier), expense)| {
            let outflow = supplier.amount + expense.amount;
            CashFlowMonth {
                month: inflow.month,
                label: inflow.label,
                inflow: inflow.amount,
                outflow,
                net: inflow.amount - outflow,
            }
        })
        .collect();

    let total_inflow: Decimal = months.iter().map(|m| m.inflow).sum();
    let supplier_payments = sum_in_range(&input.supplier_payments, input.from, input.to);
    let expense_payments = sum_in_range(&input.expense_payments, input.from, input.to);
    let total_outflow = supplier_payments + expense_payments;

    CashFlow {
        date_from: input.from,
        date_to: input.to,
        total_inflow,
        supplier_payments,
        expense_payments,
        total_outflow,
        net_cash_flow: total_inflow - total_outflow,
        months,
    }
}

fn sum_in_range(points: &[(NaiveDate, Decimal)], from: NaiveDate, to: NaiveDate) -> Decimal {
    points
        .iter()
        .filter(|(d, _)| *d >= from && *d <= to)
        .map(|(_, amount)| *amount)
        .sum()
}

// Balance sheet

#[derive(Debug, Clone, Default)]
pub struct BalanceSheetInput {
    pub cash_received: Decimal,
    pub cash_paid_to_suppliers: Decimal,
    pub cash_paid_for_expenses: Decimal,
    pub receivables: Decimal,
    pub inventory_value: Decimal,
    pub payables: Decimal,
    pub output_tax: Decimal,
    pub input_tax: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Assets {
    pub cash: Decimal,
    pub accounts_receivable: Decimal,
    pub inventory: Decimal,
    pub tax_credit: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Liabilities {
    pub accounts_payable: Decimal,
    pub tax_payable: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Equity {
    pub retained_earnings: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceSheet {
    pub as_of: NaiveDate,
    pub assets: Assets,
    pub liabilities: Liabilities,
    pub equity: Equity,
    pub total_liabilities_and_equity: Decimal,
}

/// No capital accounts are kept, so equity is the residual `assets - liabilities`
/// and the two sides agree by construction.
pub fn balance_sheet(as_of: NaiveDate, input: BalanceSheetInput) -> BalanceSheet {
    let cash = input.cash_received - input.cash_paid_to_suppliers - input.cash_paid_for_expenses;
    let net_tax = input.output_tax - input.input_tax;
    let (tax_payable, tax_credit) = if net_tax >= Decimal::ZERO {
        (net_tax, Decimal::ZERO)
    } else {
        (Decimal::ZERO, -net_tax)
    };

    let assets_total = cash + input.receivables + input.inventory_value + tax_credit;
    let liabilities_total = input.payables + tax_payable;
    let retained_earnings = assets_total - liabilities_total;
    let total_liabilities_and_equity = liabilities_total + retained_earnings;

    BalanceSheet {
        as_of,
        assets: Assets {
            cash,
            accounts_receivable: input.receivables,
            inventory: input.inventory_value,
            tax_credit,
            total: assets_total,
        },
        liabilities: Liabilities {
            accounts_payable: input.payables,
            tax_payable,
            total: liabilities_total,
        },
        equity: Equity {
            retained_earnings,
            total: retained_earnings,
        },
        total_liabilities_and_equity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn amount(units: i64) -> Decimal {
        Decimal::new(units, 0)
    }

    #[test]
    fn profit_and_loss_margins() {
        let pnl = profit_and_loss(ProfitAndLossInput {
            revenue: amount(1000),
            cost_of_purchases: amount(400),
            expenses_by_category: vec![("rent".into(), amount(150)), ("travel".into(), amount(50))],
        });

        assert_eq!(pnl.gross_profit, amount(600));
        assert_eq!(pnl.gross_margin, amount(60));
        assert_eq!(pnl.total_expenses, amount(200));
        assert_eq!(pnl.net_profit, amount(400));
        assert_eq!(pnl.net_margin, amount(40));
        assert_eq!(pnl.expenses[0].percentage, amount(75));
        assert_eq!(pnl.expenses[1].percentage, amount(25));
    }

    #[test]
    fn profit_and_loss_without_revenue() {
        let pnl = profit_and_loss(ProfitAndLossInput {
            revenue: Decimal::ZERO,
            cost_of_purchases: Decimal::ZERO,
            expenses_by_category: vec![("rent".into(), amount(100))],
        });

        assert_eq!(pnl.net_profit, amount(-100));
        assert!(pnl.gross_margin.is_zero());
        assert!(pnl.net_margin.is_zero());
    }

    #[test]
    fn cash_flow_by_month() {
        let flow = cash_flow(CashFlowInput {
            from: date(2026, 1, 1),
            to: date(2026, 2, 28),
            receipts: vec![(date(2026, 1, 10), amount(500)), (date(2026, 2, 1), amount(300))],
            supplier_payments: vec![(date(2026, 1, 15), amount(200))],
            expense_payments: vec![
                (date(2026, 2, 20), amount(50)),
                (date(2025, 12, 31), amount(999)),
            ],
        });

        assert_eq!(flow.total_inflow, amount(800));
        assert_eq!(flow.total_outflow, amount(250));
        assert_eq!(flow.net_cash_flow, amount(550));
        assert_eq!(flow.months.len(), 2);
        assert_eq!(flow.months[0].net, amount(300));
        assert_eq!(flow.months[1].net, amount(250));

        let monthly_net: Decimal = flow.months.iter().map(|m| m.net).sum();
        assert_eq!(monthly_net, flow.net_cash_flow);
    }

    #[test]
    fn balance_sheet_balances() {
        let sheet = balance_sheet(
            date(2026, 6, 30),
            BalanceSheetInput {
                cash_received: amount(5000),
                cash_paid_to_suppliers: amount(2000),
                cash_paid_for_expenses: amount(500),
                receivables: amount(1200),
                inventory_value: amount(800),
                payables: amount(700),
                output_tax: amount(300),
                input_tax: amount(100),
            },
        );

        assert_eq!(sheet.assets.cash, amount(2500));
        assert_eq!(sheet.assets.total, amount(4500));
        assert_eq!(sheet.liabilities.tax_payable, amount(200));
        assert_eq!(sheet.liabilities.total, amount(900));
        assert_eq!(sheet.equity.retained_earnings, amount(3600));
        assert_eq!(sheet.total_liabilities_and_equity, sheet.assets.total);
    }

    #[test]
    fn excess_input_tax_is_an_asset() {
        let sheet = balance_sheet(
            date(2026, 6, 30),
            BalanceSheetInput {
                output_tax: amount(100),
                input_tax: amount(250),
                ..BalanceSheetInput::default()
            },
        );

        assert_eq!(sheet.assets.tax_credit, amount(150));
        assert!(sheet.liabilities.tax_payable.is_zero());
        assert_eq!(sheet.equity.total, amount(150));
    }

    #[test]
    fn balance_sheet_body_has_no_balance_flag() {
        let sheet = balance_sheet(date(2026, 6, 30), BalanceSheetInput::default());
        let body = serde_json::to_value(&sheet).unwrap();
        assert!(body.get("is_balanced").is_none());
        assert!(body.get("total_liabilities_and_equity").is_some());
    }
}
