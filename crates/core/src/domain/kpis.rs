// Line-item labels as published in the financial statements.
pub const REVENUE: &str = "Revenue";
pub const GROSS_PROFIT: &str = "Gross Profit";
pub const OPERATING_INCOME: &str = "Operating Income";
pub const NET_INCOME: &str = "Net Income";
pub const SHARES_BASIC: &str = "Shares Outstanding (Basic)";
pub const SELLING_GENERAL_ADMIN: &str = "Selling, General & Admin";
pub const TOTAL_OPERATING_EXPENSES: &str = "Total Operating Expenses";

pub const CASH_AND_EQUIVALENTS: &str = "Cash & Equivalents";
pub const CASH_AND_SHORT_TERM: &str = "Cash & Short-Term Investments";
pub const TOTAL_CURRENT_ASSETS: &str = "Total Current Assets";
pub const TOTAL_CURRENT_LIABILITIES: &str = "Total Current Liabilities";
pub const INVENTORY: &str = "Inventory";
pub const TOTAL_DEBT: &str = "Total Debt";
pub const TOTAL_ASSETS: &str = "Total Assets";
pub const TOTAL_LIABILITIES: &str = "Total Liabilities";
pub const GOODWILL: &str = "Goodwill";
pub const PROPERTY_PLANT_EQUIPMENT: &str = "Property, Plant & Equipment";
pub const OTHER_INTANGIBLES: &str = "Other Intangible Assets";

pub const OPERATING_CASH_FLOW: &str = "Operating Cash Flow";
pub const FREE_CASH_FLOW: &str = "Free Cash Flow";

pub const INCOME_ANNUAL: [&str; 4] = [REVENUE, GROSS_PROFIT, OPERATING_INCOME, NET_INCOME];
pub const INCOME_MARGINS_TTM: [&str; 4] = [REVENUE, GROSS_PROFIT, OPERATING_INCOME, NET_INCOME];
pub const INCOME_MULTIPLES_TTM: [&str; 4] = [REVENUE, GROSS_PROFIT, NET_INCOME, SHARES_BASIC];

pub const CASH_FLOW_ANNUAL: [&str; 2] = [OPERATING_CASH_FLOW, FREE_CASH_FLOW];
pub const CASH_FLOW_MULTIPLES_TTM: [&str; 1] = [FREE_CASH_FLOW];
