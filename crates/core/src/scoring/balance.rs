use crate::domain::kpis::{
    CASH_AND_EQUIVALENTS, CASH_AND_SHORT_TERM, GOODWILL, INVENTORY, OTHER_INTANGIBLES,
    PROPERTY_PLANT_EQUIPMENT, SELLING_GENERAL_ADMIN, TOTAL_ASSETS, TOTAL_CURRENT_ASSETS,
    TOTAL_CURRENT_LIABILITIES, TOTAL_DEBT, TOTAL_LIABILITIES, TOTAL_OPERATING_EXPENSES,
};
use crate::error::ScoringError;
use crate::ingest::types::LineItems;
use crate::observer::{ScoreEvent, ScoreObserver};
use crate::scoring::{ratio, round2};
use serde::Serialize;

const LONG_TERM_MARKER: &str = "Long";
const NON_CURRENT_ASSET_ITEMS: [&str; 3] = [GOODWILL, PROPERTY_PLANT_EQUIPMENT, OTHER_INTANGIBLES];

/// How a line item is obtained when the statement does not report it directly.
#[derive(Clone, Copy)]
pub enum Fallback {
    Field(&'static str),
    Derive {
        description: &'static str,
        compute: fn(&LineItems) -> Option<f64>,
    },
}

/// One entry of the ordered fallback chain: primary line, then its substitute.
#[derive(Clone, Copy)]
pub struct FieldRule {
    pub target: &'static str,
    pub primary: &'static str,
    pub fallback: Option<Fallback>,
}

impl FieldRule {
    /// Primary value if reported, else the fallback (reported to `observer`), else `None`.
    pub fn resolve(&self, items: &LineItems, observer: &dyn ScoreObserver) -> Option<f64> {
        if let Some(v) = items.get(self.primary) {
            return Some(v);
        }

        let (value, used) = match self.fallback? {
            Fallback::Field(label) => (items.get(label), label),
            Fallback::Derive {
                description,
                compute,
            } => (compute(items), description),
        };
        if value.is_some() {
            observer.on_event(ScoreEvent::FieldFallback {
                target: self.target,
                primary: self.primary.to_string(),
                used: used.to_string(),
            });
        }
        value
    }

    pub fn require(
        &self,
        items: &LineItems,
        context: &'static str,
        observer: &dyn ScoreObserver,
    ) -> Result<f64, ScoringError> {
        self.resolve(items, observer)
            .ok_or(ScoringError::MissingField {
                field: self.target,
                context,
            })
    }
}

pub const OPERATING_EXPENSES_RULE: FieldRule = FieldRule {
    target: "operating_expenses",
    primary: SELLING_GENERAL_ADMIN,
    fallback: Some(Fallback::Field(TOTAL_OPERATING_EXPENSES)),
};

pub const CASH_RULE: FieldRule = FieldRule {
    target: "cash",
    primary: CASH_AND_SHORT_TERM,
    fallback: Some(Fallback::Field(CASH_AND_EQUIVALENTS)),
};

pub const CURRENT_ASSETS_RULE: FieldRule = FieldRule {
    target: "current_assets",
    primary: TOTAL_CURRENT_ASSETS,
    fallback: Some(Fallback::Derive {
        description: "Total Assets less non-current assets",
        compute: derive_current_assets,
    }),
};

pub const CURRENT_LIABILITIES_RULE: FieldRule = FieldRule {
    target: "current_liabilities",
    primary: TOTAL_CURRENT_LIABILITIES,
    fallback: Some(Fallback::Derive {
        description: "Total Liabilities less long-term liabilities",
        compute: derive_current_liabilities,
    }),
};

pub const INVENTORY_RULE: FieldRule = FieldRule {
    target: "inventory",
    primary: INVENTORY,
    fallback: None,
};

pub const TOTAL_DEBT_RULE: FieldRule = FieldRule {
    target: "total_debt",
    primary: TOTAL_DEBT,
    fallback: None,
};

pub const TOTAL_ASSETS_RULE: FieldRule = FieldRule {
    target: "total_assets",
    primary: TOTAL_ASSETS,
    fallback: None,
};

/// Total Assets minus every asset line above it that is long-term, goodwill, PP&E or
/// other intangibles. Placeholder cells count as zero.
pub fn derive_current_assets(items: &LineItems) -> Option<f64> {
    let ix_total = items.position(TOTAL_ASSETS)?;
    let total = items.get(TOTAL_ASSETS)?;
    let non_current: f64 = items
        .slice(0, ix_total)
        .iter()
        .filter(|(label, _)| {
            label.contains(LONG_TERM_MARKER) || NON_CURRENT_ASSET_ITEMS.contains(&label.as_str())
        })
        .map(|(_, v)| v.unwrap_or(0.0))
        .sum();
    Some(total - non_current)
}

/// Total Liabilities minus every liability line that is long-term but not current.
pub fn derive_current_liabilities(items: &LineItems) -> Option<f64> {
    let ix_assets = items.position(TOTAL_ASSETS)?;
    let ix_total = items.position(TOTAL_LIABILITIES)?;
    let total = items.get(TOTAL_LIABILITIES)?;
    let non_current: f64 = items
        .slice(ix_assets + 1, ix_total)
        .iter()
        .filter(|(label, _)| label.contains(LONG_TERM_MARKER) && !label.contains("Current"))
        .map(|(_, v)| v.unwrap_or(0.0))
        .sum();
    Some(total - non_current)
}

/// Solvency ratios scored by the health rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BalanceRatios {
    pub months_operation: Option<f64>,
    pub current_ratio: Option<f64>,
    /// Absent when the balance sheet reports no inventory.
    pub quick_ratio: Option<f64>,
    pub debt_ratio: Option<f64>,
}

/// Ratios plus the line items they were computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceKpis {
    pub operation_expenses_month: f64,
    pub cash: f64,
    pub current_assets: f64,
    pub current_liabilities: f64,
    pub inventory: Option<f64>,
    pub total_debt: f64,
    pub total_assets: f64,
    #[serde(flatten)]
    pub ratios: BalanceRatios,
}

/// Derives the four solvency ratios from the latest balance sheet and income statement.
pub fn derive_balance_kpis(
    balance: &LineItems,
    income: &LineItems,
    observer: &dyn ScoreObserver,
) -> Result<BalanceKpis, ScoringError> {
    let operating_expenses = OPERATING_EXPENSES_RULE.require(income, "income statement", observer)?;
    let operation_expenses_month = operating_expenses / 12.0;

    let cash = CASH_RULE.require(balance, "balance sheet", observer)?;
    let current_assets = CURRENT_ASSETS_RULE.require(balance, "balance sheet", observer)?;
    let current_liabilities = CURRENT_LIABILITIES_RULE.require(balance, "balance sheet", observer)?;
    let total_debt = TOTAL_DEBT_RULE.require(balance, "balance sheet", observer)?;
    let total_assets = TOTAL_ASSETS_RULE.require(balance, "balance sheet", observer)?;

    let inventory = INVENTORY_RULE.resolve(balance, observer);
    if inventory.is_none() {
        observer.on_event(ScoreEvent::FieldMissing {
            field: INVENTORY.to_string(),
            context: "quick ratio not computed",
        });
    }

    let ratios = BalanceRatios {
        months_operation: rounded_ratio(cash, operation_expenses_month),
        current_ratio: rounded_ratio(current_assets, current_liabilities),
        quick_ratio: inventory
            .and_then(|inv| rounded_ratio(current_assets - inv, current_liabilities)),
        debt_ratio: rounded_ratio(total_debt, total_assets),
    };

    Ok(BalanceKpis {
        operation_expenses_month,
        cash,
        current_assets,
        current_liabilities,
        inventory,
        total_debt,
        total_assets,
        ratios,
    })
}

fn rounded_ratio(num: f64, den: f64) -> Option<f64> {
    ratio(Some(num), Some(den)).map(round2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    AtLeast,
    AtMost,
}

#[derive(Clone, Copy)]
struct HealthRule {
    name: &'static str,
    threshold: f64,
    kind: Threshold,
    value: fn(&BalanceRatios) -> Option<f64>,
}

const HEALTH_RULES: [HealthRule; 4] = [
    HealthRule {
        name: "months_operation",
        threshold: 3.0,
        kind: Threshold::AtLeast,
        value: |r: &BalanceRatios| r.months_operation,
    },
    HealthRule {
        name: "current_ratio",
        threshold: 0.7,
        kind: Threshold::AtLeast,
        value: |r: &BalanceRatios| r.current_ratio,
    },
    HealthRule {
        name: "quick_ratio",
        threshold: 0.7,
        kind: Threshold::AtLeast,
        value: |r: &BalanceRatios| r.quick_ratio,
    },
    HealthRule {
        name: "debt_ratio",
        threshold: 0.5,
        kind: Threshold::AtMost,
        value: |r: &BalanceRatios| r.debt_ratio,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub rule: &'static str,
    pub value: Option<f64>,
    pub threshold: f64,
    pub kind: Threshold,
    /// `None` when the ratio was absent or zero and the rule was not evaluated.
    pub passed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceScore {
    /// 10 x passed / evaluated; `None` if no rule could be evaluated.
    pub score: Option<f64>,
    pub rules: Vec<RuleOutcome>,
}

/// Pass/fail health rules over the solvency ratios. A ratio that is absent or zero
/// skips its rule instead of failing it.
pub fn score_balance(ratios: &BalanceRatios) -> BalanceScore {
    let rules: Vec<RuleOutcome> = HEALTH_RULES
        .iter()
        .map(|rule| {
            let value = (rule.value)(ratios);
            let passed = value.filter(|v| *v != 0.0).map(|v| match rule.kind {
                Threshold::AtLeast => v >= rule.threshold,
                Threshold::AtMost => v <= rule.threshold,
            });
            RuleOutcome {
                rule: rule.name,
                value,
                threshold: rule.threshold,
                kind: rule.kind,
                passed,
            }
        })
        .collect();

    let evaluated = rules.iter().filter(|r| r.passed.is_some()).count();
    let passed = rules.iter().filter(|r| r.passed == Some(true)).count();
    let score = (evaluated > 0).then(|| 10.0 * passed as f64 / evaluated as f64);

    BalanceScore { score, rules }
}
