// src/config/terms.rs
//! Built-in keyword and publisher lists used for query building and industry scoring.

/// Fallback product keywords; also the base of every industry term list.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "cloud",
    "AI",
    "artificial intelligence",
    "ML",
    "machine learning",
    "digital transformation",
    "data",
    "security",
    "cyber",
    "automation",
    "SaaS",
    "software",
    "hardware",
    "IT services",
    "tech",
    "IoT",
    "blockchain",
    "DevOps",
    "API",
    "enterprise",
    "computing",
];

/// Industry-specific publishers, keyed by lowercase industry tag.
pub fn industry_sources(industry: &str) -> &'static [&'static str] {
    match industry.trim().to_ascii_lowercase().as_str() {
        "healthcare" => &[
            "healthcareitnews.com",
            "mobihealthnews.com",
            "medcitynews.com",
            "fiercehealthcare.com",
        ],
        "finance" => &[
            "finextra.com",
            "financemagnates.com",
            "bankingdive.com",
            "fintechfutures.com",
        ],
        "retail" => &[
            "retaildive.com",
            "retailwire.com",
            "modernretail.co",
            "chainstoreage.com",
        ],
        "manufacturing" => &[
            "industryweek.com",
            "manufacturing.net",
            "automationworld.com",
        ],
        "logistics" => &[
            "supplychaindive.com",
            "freightwaves.com",
            "logisticsmgmt.com",
        ],
        _ => &[],
    }
}

/// Terms counted by the industry component of the relevance score:
/// the default keyword list followed by the industry's publisher list.
pub fn industry_terms(industry: &str) -> Vec<&'static str> {
    DEFAULT_KEYWORDS
        .iter()
        .chain(industry_sources(industry).iter())
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn industry_lookup_is_case_insensitive() {
        assert_eq!(industry_sources("Finance").len(), 4);
        assert!(industry_sources("tech").is_empty());
    }

    #[test]
    fn terms_start_with_default_keywords() {
        let t = industry_terms("logistics");
        assert_eq!(t.len(), DEFAULT_KEYWORDS.len() + 3);
        assert_eq!(t[0], "cloud");
        assert_eq!(*t.last().unwrap(), "logisticsmgmt.com");
    }
}
