//! Sales-context stage: a short business analysis of the prospect built from
//! the news summaries and the product facts.

use tracing::{info, warn};

use crate::config::ProductProfile;
use crate::generate::{DynGenerator, GenerateOptions};

/// Inputs to one sales-context generation.
#[derive(Debug, Clone, Copy)]
pub struct ContextRequest<'a> {
    pub company: &'a str,
    pub industry: &'a str,
    pub competitor: Option<&'a str>,
    pub news_summary: &'a str,
    pub competitor_summary: &'a str,
    pub product: &'a ProductProfile,
}

#[derive(Clone)]
pub struct ContextWriter {
    generator: DynGenerator,
    opts: GenerateOptions,
}

impl ContextWriter {
    pub fn new(generator: DynGenerator, opts: GenerateOptions) -> Self {
        Self { generator, opts }
    }

    /// Generated context, or a placeholder when the generator fails.
    pub async fn write(&self, req: &ContextRequest<'_>) -> String {
        let prompt = context_prompt(req);
        match self.generator.generate(&prompt, &self.opts).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(target: "signals::context", company = req.company, chars = text.len(), "sales context generated");
                text.trim().to_string()
            }
            Ok(_) => placeholder(req.company),
            Err(e) => {
                warn!(target: "signals::context", company = req.company, error = %e, "sales context failed, using placeholder");
                placeholder(req.company)
            }
        }
    }
}

pub fn placeholder(company: &str) -> String {
    format!("No specific context generated for {company}. Using industry-standard challenges.")
}

/// A summary that only says nothing was found counts as no news.
pub fn has_news(news_summary: &str) -> bool {
    !news_summary.trim().is_empty() && !news_summary.to_lowercase().contains("no specific")
}

pub fn context_prompt(req: &ContextRequest<'_>) -> String {
    let company = req.company;
    let industry = req.industry;
    let product = if req.product.name.trim().is_empty() {
        "our product"
    } else {
        req.product.name.as_str()
    };

    let news = if has_news(req.news_summary) {
        req.news_summary
    } else {
        "No specific news available."
    };
    let competitor = match req.competitor {
        Some(name) if !req.competitor_summary.trim().is_empty() => {
            format!("\nCOMPETITOR NEWS ({name}):\n{}\n", req.competitor_summary)
        }
        _ => String::new(),
    };

    format!(
        "Analyze {company} and write a concise business context that helps a sales representative position {product}.\n\
         \n\
         NEWS SUMMARY:\n{news}\n\
         {competitor}\n\
         PRODUCT:\n{description}\n\
         \n\
         INDUSTRY: {industry}\n\
         \n\
         Cover four parts:\n\
         1. Strategic challenges {company} faces, from the news or, without news, typical {industry} challenges.\n\
         2. Strategic opportunities where {product} addresses those challenges, including staying ahead of competitors when competitor news is given.\n\
         3. Engagement strategy: three or four talking points tied to measurable benefits.\n\
         4. Industry alignment: how {product} fits current {industry} priorities.\n\
         Be specific and professional; avoid generic statements.",
        description = req.product.description,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::MockGenerator;
    use std::sync::Arc;

    fn product() -> ProductProfile {
        ProductProfile {
            name: "SecureShield AI".into(),
            description: "Threat detection with automated compliance reporting.".into(),
            usp: "Accuracy and automation".into(),
        }
    }

    #[test]
    fn prompt_swaps_no_news_and_includes_competitor() {
        let p = product();
        let req = ContextRequest {
            company: "Acme",
            industry: "finance",
            competitor: Some("Globex"),
            news_summary: "No specific recent news found for Acme.",
            competitor_summary: "Globex launched a fraud API.",
            product: &p,
        };
        let prompt = context_prompt(&req);
        assert!(prompt.contains("No specific news available."));
        assert!(prompt.contains("COMPETITOR NEWS (Globex)"));
        assert!(prompt.contains("SecureShield AI"));
        assert!(prompt.contains("INDUSTRY: finance"));
    }

    #[tokio::test]
    async fn failure_is_placeholder() {
        let p = product();
        let req = ContextRequest {
            company: "Acme",
            industry: "tech",
            competitor: None,
            news_summary: "Acme raised funds.",
            competitor_summary: "",
            product: &p,
        };
        let broken = ContextWriter::new(Arc::new(MockGenerator::failing()), GenerateOptions::default());
        assert_eq!(broken.write(&req).await, placeholder("Acme"));

        let ok = ContextWriter::new(Arc::new(MockGenerator::fixed(" analysis ")), GenerateOptions::default());
        assert_eq!(ok.write(&req).await, "analysis");
    }
}
