//! Predeclared intake fields
//!
//! Both intake flows collect the same fields. The guided interview walks the
//! categories one step at a time; manual entry shows them all at once.

/// One question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Answer key sent to the API
    pub id: String,
    /// Question text
    pub label: String,
    /// Required before submission
    pub mandatory: bool,
}

impl FieldDef {
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>, mandatory: bool) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            mandatory,
        }
    }
}

/// Ordered group of fields, shown as one wizard step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Step title
    pub name: String,
    /// Questions in display order
    pub fields: Vec<FieldDef>,
}

impl Category {
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// Ordered categories of intake fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalogue {
    categories: Vec<Category>,
}

impl Catalogue {
    /// Build from explicit categories
    #[must_use]
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// The questionnaire used by both intake flows
    #[must_use]
    pub fn standard() -> Self {
        let f = FieldDef::new;
        Self::new(vec![
            Category::new(
                "Business Profile",
                vec![
                    f("business_name", "Business name", true),
                    f("legal_structure", "Legal structure", false),
                    f("region", "Region", true),
                    f("years_operating", "Years operating", false),
                ],
            ),
            Category::new(
                "Operations",
                vec![
                    f("primary_enterprise", "Primary enterprise", true),
                    f("acreage", "Operated acreage", true),
                    f("irrigation", "Irrigation source", false),
                    f("labour_force", "Permanent staff", false),
                ],
            ),
            Category::new(
                "Financials",
                vec![
                    f("annual_revenue", "Annual revenue", true),
                    f("operating_costs", "Operating costs", false),
                    f("total_debt", "Total debt", true),
                    f("equity", "Owner equity", false),
                ],
            ),
            Category::new(
                "Market & Sales",
                vec![
                    f("sales_channels", "Sales channels", true),
                    f("key_buyers", "Key buyers", false),
                    f("contract_coverage", "Share of output under contract", false),
                ],
            ),
            Category::new(
                "Risk Management",
                vec![
                    f("insurance_coverage", "Insurance coverage", true),
                    f("succession_plan", "Succession plan", false),
                    f("diversification", "Diversification", false),
                ],
            ),
        ])
    }

    /// Number of wizard steps
    #[inline]
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn category(&self, step: usize) -> Option<&Category> {
        self.categories.get(step)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    /// Every field in display order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.categories.iter().flat_map(|c| c.fields.iter())
    }

    #[must_use]
    pub fn field(&self, id: &str) -> Option<&FieldDef> {
        self.fields().find(|f| f.id == id)
    }

    /// Ids of every mandatory field across all steps
    pub fn mandatory_ids(&self) -> impl Iterator<Item = &str> {
        self.fields().filter(|f| f.mandatory).map(|f| f.id.as_str())
    }

    /// Step that holds a field
    #[must_use]
    pub fn step_of(&self, id: &str) -> Option<usize> {
        self.categories
            .iter()
            .position(|c| c.fields.iter().any(|f| f.id == id))
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::standard()
    }
}
