use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Category assigned when no rule and no sign fallback applies.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignFilter {
    #[default]
    Any,
    Credit,
    Debit,
}

impl SignFilter {
    fn admits(self, amount: Decimal) -> bool {
        match self {
            SignFilter::Any => true,
            SignFilter::Credit => amount > Decimal::ZERO,
            SignFilter::Debit => amount < Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    #[default]
    Contains,
    Regex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub label: String,
    pub pattern: String,
    #[serde(default)]
    pub kind: PatternKind,
    #[serde(default)]
    pub applies_to: SignFilter,
    /// Rules flagged here get their own projected view named by label.
    #[serde(default)]
    pub merchant_view: bool,
}

impl CategoryRule {
    fn contains(label: &str, pattern: &str, applies_to: SignFilter) -> Self {
        Self {
            label: label.to_string(),
            pattern: pattern.to_string(),
            kind: PatternKind::Contains,
            applies_to,
            merchant_view: false,
        }
    }
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    rule: Vec<CategoryRule>,
}

/// Pairing of a rule with its precompiled regex (if applicable).
struct CompiledRule {
    rule: CategoryRule,
    compiled_regex: Option<regex::Regex>,
}

/// Ordered rule list, first match wins. Rule order is a behavioral
/// contract: reordering changes categorization output.
pub struct CategoryEngine {
    rules: Vec<CompiledRule>,
}

impl CategoryEngine {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let compiled_regex = if rule.kind == PatternKind::Regex {
                    regex::Regex::new(&rule.pattern).ok()
                } else {
                    None
                };
                CompiledRule { rule, compiled_regex }
            })
            .collect();
        Self { rules }
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, String> {
        let file: RuleFile =
            toml::from_str(toml_content).map_err(|e| format!("Failed to parse TOML: {e}"))?;
        Ok(Self::new(file.rule))
    }

    /// The default rule set: the eBay merchant rule first, then the common
    /// debit keyword groups, in an order that is part of the contract.
    pub fn default_rules() -> Vec<CategoryRule> {
        let mut rules = vec![CategoryRule {
            label: "eBay".to_string(),
            pattern: "ebay".to_string(),
            kind: PatternKind::Contains,
            applies_to: SignFilter::Any,
            merchant_view: true,
        }];
        let groups: &[(&str, &[&str])] = &[
            ("Grocery", &["grocery", "supermarket", "food", "walmart", "target"]),
            ("Gas", &["gas", "fuel", "petrol", "shell", "chevron"]),
            ("Utilities", &["electric", "water", "internet", "phone"]),
            ("Dining", &["restaurant", "cafe", "pizza", "mcdonald", "starbucks"]),
            ("Shopping", &["amazon", "store", "retail", "purchase"]),
        ];
        for (label, patterns) in groups {
            for pattern in *patterns {
                rules.push(CategoryRule::contains(label, pattern, SignFilter::Debit));
            }
        }
        rules
    }

    /// Labels of rules that project their own merchant view, deduplicated,
    /// in rule order.
    pub fn merchant_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for cr in &self.rules {
            if cr.rule.merchant_view && !labels.iter().any(|l| l == &cr.rule.label) {
                labels.push(cr.rule.label.clone());
            }
        }
        labels
    }

    /// Assign a category. First matching rule wins; a credit with no match
    /// is Income, a debit Expense, a zero amount Uncategorized.
    pub fn categorize(&self, details: &str, amount: Decimal) -> String {
        let text = details.to_lowercase();
        for cr in &self.rules {
            if !cr.rule.applies_to.admits(amount) {
                continue;
            }
            let hit = match cr.rule.kind {
                PatternKind::Contains => text.contains(&cr.rule.pattern.to_lowercase()),
                PatternKind::Regex => cr
                    .compiled_regex
                    .as_ref()
                    .is_some_and(|re| re.is_match(details)),
            };
            if hit {
                return cr.rule.label.clone();
            }
        }
        if amount > Decimal::ZERO {
            "Income".to_string()
        } else if amount < Decimal::ZERO {
            "Expense".to_string()
        } else {
            UNCATEGORIZED.to_string()
        }
    }
}

impl Default for CategoryEngine {
    fn default() -> Self {
        Self::new(Self::default_rules())
    }
}
