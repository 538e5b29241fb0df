use crate::utils::error::{Result, TreehouseError};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// 一個零售商的郵件特徵
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorDefinition {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub from_patterns: Vec<String>,
    #[serde(default)]
    pub subject_patterns: Vec<String>,
}

fn vendor(
    key: &str,
    name: &str,
    domains: &[&str],
    from_patterns: &[&str],
    subject_patterns: &[&str],
) -> VendorDefinition {
    let owned = |list: &[&str]| -> Vec<String> { list.iter().map(|s| s.to_string()).collect() };
    VendorDefinition {
        key: key.to_string(),
        name: name.to_string(),
        domains: owned(domains),
        from_patterns: owned(from_patterns),
        subject_patterns: owned(subject_patterns),
    }
}

pub fn builtin_vendors() -> Vec<VendorDefinition> {
    vec![
        vendor(
            "amazon",
            "Amazon",
            &["amazon.com", "amazon.co.uk", "amazon.ca"],
            &[
                r"auto-confirm@amazon\.com",
                r"ship-confirm@amazon\.com",
                r"order-update@amazon\.com",
                r"digital-no-reply@amazon\.com",
            ],
            &[
                r"Your Amazon\.com order",
                r"Your order.*has shipped",
                r"Your Amazon order",
                r"Shipped:",
                r"Delivery",
            ],
        ),
        vendor(
            "homedepot",
            "Home Depot",
            &["homedepot.com"],
            &[r"@homedepot\.com", r"@emails\.homedepot\.com"],
            &[
                r"Your Home Depot Order",
                r"Order Confirmation",
                r"Your order.*shipped",
                r"Your order is ready",
                r"Thank you for your purchase",
            ],
        ),
        vendor(
            "lowes",
            "Lowe's",
            &["lowes.com"],
            &[r"@lowes\.com", r"@email\.lowes\.com"],
            &[
                r"Your Lowe's Order",
                r"Order Confirmation",
                r"Your order.*shipped",
                r"Receipt",
            ],
        ),
        vendor(
            "bestbuy",
            "Best Buy",
            &["bestbuy.com"],
            &[r"@bestbuy\.com", r"@emailinfo\.bestbuy\.com"],
            &[
                r"Your Best Buy Order",
                r"Order Confirmation",
                r"Your order.*shipped",
                r"Thanks for your order",
            ],
        ),
        vendor(
            "costco",
            "Costco",
            &["costco.com"],
            &[r"@costco\.com", r"@online\.costco\.com"],
            &[
                r"Your Costco",
                r"Order Confirmation",
                r"Your order.*shipped",
                r"Receipt",
            ],
        ),
        vendor(
            "walmart",
            "Walmart",
            &["walmart.com"],
            &[r"@walmart\.com", r"@email\.walmart\.com"],
            &[
                r"Your Walmart",
                r"Order Confirmation",
                r"Your order.*shipped",
                r"Thanks for your order",
            ],
        ),
        vendor(
            "target",
            "Target",
            &["target.com"],
            &[r"@target\.com", r"@em\.target\.com"],
            &[
                r"Your Target",
                r"Order Confirmation",
                r"Your order.*shipped",
                r"Thanks for your order",
            ],
        ),
        vendor(
            "wayfair",
            "Wayfair",
            &["wayfair.com"],
            &[r"@wayfair\.com", r"@email\.wayfair\.com"],
            &[
                r"Your Wayfair",
                r"Order Confirmation",
                r"Your order.*shipped",
                r"Order Details",
            ],
        ),
        vendor(
            "ikea",
            "IKEA",
            &["ikea.com", "ikea.us"],
            &[r"@ikea\.com", r"@info\.ikea\.com"],
            &[
                r"Your IKEA",
                r"Order Confirmation",
                r"Your order.*shipped",
                r"Order Details",
            ],
        ),
        vendor(
            "menards",
            "Menards",
            &["menards.com"],
            &[r"@menards\.com", r"@email\.menards\.com"],
            &[
                r"Your Menards",
                r"Order Confirmation",
                r"Your order.*shipped",
                r"Receipt",
            ],
        ),
        vendor(
            "acehardware",
            "Ace Hardware",
            &["acehardware.com"],
            &[r"@acehardware\.com", r"@email\.acehardware\.com"],
            &[
                r"Your Ace Hardware",
                r"Order Confirmation",
                r"Your order.*shipped",
                r"Receipt",
            ],
        ),
    ]
}

fn compile_all(vendor: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|e| TreehouseError::InvalidConfigValueError {
                    field: format!("scanner.vendors.{}", vendor),
                    value: p.clone(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

#[derive(Debug, Clone)]
struct CompiledVendor {
    definition: VendorDefinition,
    from: Vec<Regex>,
    subject: Vec<Regex>,
}

/// 廠商 key 不分大小寫，前後空白不計
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// 已編譯的廠商目錄；順序即比對優先順序
#[derive(Debug, Clone)]
pub struct VendorCatalog {
    vendors: Vec<CompiledVendor>,
}

impl VendorCatalog {
    pub fn new(definitions: Vec<VendorDefinition>) -> Result<Self> {
        let vendors = definitions
            .into_iter()
            .map(|mut definition| {
                definition.key = normalize_key(&definition.key);
                Ok(CompiledVendor {
                    from: compile_all(&definition.key, &definition.from_patterns)?,
                    subject: compile_all(&definition.key, &definition.subject_patterns)?,
                    definition,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { vendors })
    }

    pub fn builtin() -> Result<Self> {
        Self::new(builtin_vendors())
    }

    /// 內建目錄加上設定檔裡的廠商；同 key 時以設定檔為準
    pub fn with_extra(extra: Vec<VendorDefinition>) -> Result<Self> {
        let mut definitions = builtin_vendors();
        for mut def in extra {
            def.key = normalize_key(&def.key);
            match definitions.iter_mut().find(|d| d.key == def.key) {
                Some(existing) => *existing = def,
                None => definitions.push(def),
            }
        }
        Self::new(definitions)
    }

    pub fn get(&self, key: &str) -> Option<&VendorDefinition> {
        self.vendors
            .iter()
            .find(|v| v.definition.key == key)
            .map(|v| &v.definition)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.vendors.iter().map(|v| v.definition.key.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VendorDefinition> {
        self.vendors.iter().map(|v| &v.definition)
    }

    /// 依寄件者辨識廠商：寄件者樣式或網域任一符合即可
    pub fn identify(&self, from_addr: &str) -> Option<&VendorDefinition> {
        let from_lower = from_addr.to_lowercase();
        self.vendors
            .iter()
            .find(|v| {
                v.from.iter().any(|re| re.is_match(&from_lower))
                    || v.definition
                        .domains
                        .iter()
                        .any(|d| from_lower.contains(&d.to_lowercase()))
            })
            .map(|v| &v.definition)
    }

    pub fn subject_matches(&self, key: &str, subject: &str) -> bool {
        self.vendors
            .iter()
            .find(|v| v.definition.key == key)
            .is_some_and(|v| v.subject.iter().any(|re| re.is_match(subject)))
    }
}

/// 有序的關鍵字表；同分時取先出現者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub code: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordTable {
    rules: Vec<KeywordRule>,
}

impl KeywordTable {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| KeywordRule {
                code: r.code,
                keywords: r.keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self { rules }
    }

    fn from_static(table: &[(&str, &[&str])]) -> Self {
        Self::new(
            table
                .iter()
                .map(|(code, keywords)| KeywordRule {
                    code: code.to_string(),
                    keywords: keywords.iter().map(|k| k.to_string()).collect(),
                })
                .collect(),
        )
    }

    /// 同代碼的規則取代原本的關鍵字，新代碼接在最後
    pub fn with_overrides(self, overrides: Vec<KeywordRule>) -> Self {
        let mut rules = self.rules;
        for rule in KeywordTable::new(overrides).rules {
            match rules.iter_mut().find(|r| r.code == rule.code) {
                Some(existing) => *existing = rule,
                None => rules.push(rule),
            }
        }
        Self { rules }
    }

    pub fn codes(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.code.as_str()).collect()
    }

    /// 命中最多關鍵字的代碼（子字串比對）
    pub fn best_match(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        let mut best: Option<(&str, usize)> = None;

        for rule in &self.rules {
            let count = rule.keywords.iter().filter(|kw| lower.contains(kw.as_str())).count();
            if count > 0 && best.map_or(true, |(_, top)| count > top) {
                best = Some((&rule.code, count));
            }
        }

        best.map(|(code, _)| code)
    }

    pub fn property_defaults() -> Self {
        Self::from_static(&[
            ("DAL", &["dallas", "dal", "75", "tx 75"]),
            ("ATX-A", &["austin", "main", "unit a", "78"]),
            ("ATX-B", &["adu", "unit b", "casita"]),
            ("ATX-C", &["unit c", "adu c"]),
        ])
    }

    pub fn category_defaults() -> Self {
        Self::from_static(&[
            (
                "HVAC",
                &[
                    "air conditioner", "ac unit", "hvac", "furnace", "heat pump",
                    "thermostat", "mini split", "condenser", "air handler", "ductless",
                    "heating", "cooling", "climate", "nest", "ecobee",
                ],
            ),
            (
                "APPL",
                &[
                    "refrigerator", "fridge", "freezer", "washer", "dryer",
                    "dishwasher", "microwave", "oven", "range", "stove",
                    "garbage disposal", "trash compactor", "ice maker",
                ],
            ),
            (
                "PLMB",
                &[
                    "water heater", "tankless", "toilet", "faucet", "sink",
                    "shower", "bathtub", "pipe", "valve", "drain", "plumbing",
                    "sump pump", "water softener", "water filter",
                ],
            ),
            (
                "ELEC",
                &[
                    "electrical panel", "breaker", "outlet", "switch", "light",
                    "fixture", "ceiling fan", "chandelier", "sconce", "dimmer",
                    "surge protector", "generator", "inverter", "solar",
                ],
            ),
            (
                "TOOL",
                &[
                    "drill", "saw", "hammer", "wrench", "screwdriver", "pliers",
                    "ladder", "level", "measuring", "power tool", "cordless",
                    "compressor", "pressure washer", "shop vac",
                ],
            ),
            (
                "TECH",
                &[
                    "computer", "laptop", "monitor", "keyboard", "mouse",
                    "router", "modem", "wifi", "network", "camera", "security",
                    "smart home", "hub", "speaker", "television", "tv",
                ],
            ),
            (
                "FURN",
                &[
                    "desk", "chair", "table", "sofa", "couch", "bed", "mattress",
                    "dresser", "cabinet", "shelf", "bookcase", "ottoman",
                ],
            ),
            (
                "LAND",
                &[
                    "mower", "lawn", "trimmer", "blower", "edger", "sprinkler",
                    "irrigation", "hose", "garden", "outdoor", "patio",
                ],
            ),
            (
                "SAFE",
                &[
                    "smoke detector", "carbon monoxide", "co detector", "fire",
                    "extinguisher", "alarm", "sensor", "detector", "safe",
                ],
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_by_from_pattern_and_domain() {
        let catalog = VendorCatalog::builtin().unwrap();

        let amazon = catalog.identify("Amazon.com <auto-confirm@amazon.com>").unwrap();
        assert_eq!(amazon.name, "Amazon");

        let ikea = catalog.identify("IKEA <noreply@ikea.us>").unwrap();
        assert_eq!(ikea.key, "ikea");

        let depot = catalog.identify("\"The Home Depot\" <HomeDepot@Emails.HomeDepot.com>").unwrap();
        assert_eq!(depot.key, "homedepot");

        assert!(catalog.identify("friend@example.org").is_none());
    }

    #[test]
    fn test_extra_vendor_overrides_builtin_key() {
        let catalog = VendorCatalog::with_extra(vec![
            VendorDefinition {
                key: "target".to_string(),
                name: "Target Stores".to_string(),
                domains: vec!["target.com".to_string()],
                from_patterns: vec![],
                subject_patterns: vec![],
            },
            VendorDefinition {
                key: "rei".to_string(),
                name: "REI".to_string(),
                domains: vec!["rei.com".to_string()],
                from_patterns: vec![r"@notices\.rei\.com".to_string()],
                subject_patterns: vec![r"Your REI order".to_string()],
            },
        ])
        .unwrap();

        assert_eq!(catalog.get("target").unwrap().name, "Target Stores");
        assert_eq!(catalog.identify("x@notices.rei.com").unwrap().key, "rei");
        assert!(catalog.subject_matches("rei", "your rei ORDER #123"));
        assert_eq!(catalog.keys().len(), 12);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let result = VendorCatalog::new(vec![VendorDefinition {
            key: "broken".to_string(),
            name: "Broken".to_string(),
            domains: vec![],
            from_patterns: vec!["(".to_string()],
            subject_patterns: vec![],
        }]);
        assert!(matches!(
            result,
            Err(TreehouseError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_keyword_ties_go_to_first_rule() {
        let properties = KeywordTable::property_defaults();
        // ATX-B 命中 "adu"，ATX-C 命中 "adu c"：同分取 ATX-B
        assert_eq!(properties.best_match("Ship to ADU C"), Some("ATX-B"));
        assert_eq!(properties.best_match("Unit C / ADU C"), Some("ATX-C"));
        // dallas + 75 對上 austin：DAL 勝出
        assert_eq!(properties.best_match("Dallas TX 75201"), Some("DAL"));
        assert_eq!(properties.best_match("Seattle WA"), None);

        let categories = KeywordTable::category_defaults();
        assert_eq!(categories.best_match("Samsung French Door Refrigerator"), Some("APPL"));
        // "drill" 與 "cordless" 兩個命中
        assert_eq!(categories.best_match("DeWalt Cordless Drill"), Some("TOOL"));
        assert_eq!(categories.best_match("Paper towels"), None);
    }
}
