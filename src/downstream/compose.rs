//! Compose stage: one outreach email per prospect.

use async_trait::async_trait;
use tracing::warn;

use crate::config::ProductProfile;
use crate::downstream::context::has_news;
use crate::error::SignalResult;
use crate::generate::{DynGenerator, GenerateOptions};
use crate::model::Prospect;

/// Everything the composer may use for one email.
#[derive(Debug, Clone, Copy)]
pub struct ComposeInput<'a> {
    pub prospect: &'a Prospect,
    pub industry: &'a str,
    pub news_summary: &'a str,
    pub competitor: Option<&'a str>,
    pub competitor_summary: &'a str,
    pub sales_context: &'a str,
    pub product: &'a ProductProfile,
}

#[async_trait]
pub trait Composer: Send + Sync {
    async fn compose(&self, input: &ComposeInput<'_>) -> SignalResult<String>;
    fn name(&self) -> &'static str;
}

/// Compose, substituting a placeholder on failure.
pub async fn compose_or_placeholder(composer: &dyn Composer, input: &ComposeInput<'_>) -> String {
    match composer.compose(input).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => placeholder(input.prospect),
        Err(e) => {
            warn!(target: "signals::compose", company = input.prospect.entity(), composer = composer.name(), error = %e, "email composition failed, using placeholder");
            placeholder(input.prospect)
        }
    }
}

pub fn placeholder(prospect: &Prospect) -> String {
    format!(
        "Email could not be generated for {}. Please retry later.",
        prospect.entity()
    )
}

/// Typical priorities per industry, used when there is no prospect news.
pub fn industry_trends(industry: &str) -> &'static str {
    match industry.trim().to_ascii_lowercase().as_str() {
        "tech" => "AI-driven automation, cybersecurity and cloud adoption",
        "healthcare" => "interoperable systems, patient data security and telehealth",
        "finance" => "fraud prevention, regulatory compliance and digital banking",
        "retail" => "e-commerce, personalized customer experience and supply chain optimization",
        "manufacturing" => "Industry 4.0 adoption, supply chain resilience and sustainability",
        "logistics" => "real-time tracking, cost optimization and automation",
        _ => "operational efficiency and digital transformation",
    }
}

/// Single neutral prompt sent to the text generator.
pub struct PromptComposer {
    generator: DynGenerator,
    opts: GenerateOptions,
}

impl PromptComposer {
    pub fn new(generator: DynGenerator, opts: GenerateOptions) -> Self {
        Self { generator, opts }
    }
}

#[async_trait]
impl Composer for PromptComposer {
    async fn compose(&self, input: &ComposeInput<'_>) -> SignalResult<String> {
        let prompt = compose_prompt(input);
        self.generator.generate(&prompt, &self.opts).await
    }

    fn name(&self) -> &'static str {
        "prompt"
    }
}

pub fn compose_prompt(input: &ComposeInput<'_>) -> String {
    let p = input.prospect;
    let company = p.entity();
    let recipient = match (p.prospect_name.trim(), p.prospect_title.trim()) {
        ("", _) => format!("a decision maker at {company}"),
        (name, "") => format!("{name} at {company}"),
        (name, title) => format!("{name}, {title} at {company}"),
    };

    let news = if has_news(input.news_summary) {
        input.news_summary.to_string()
    } else {
        format!(
            "No recent news found for {company}. Relevant {} trends: {}.",
            input.industry,
            industry_trends(input.industry)
        )
    };

    let mut sections = vec![
        format!(
            "Write a plain-text B2B sales email to {recipient} in the {} industry. \
             No HTML or Markdown. Keep it under 250 words with a clear call to action.",
            input.industry
        ),
        format!("NEWS CONTEXT:\n{news}"),
    ];
    if let Some(name) = input.competitor {
        if !input.competitor_summary.trim().is_empty() {
            sections.push(format!(
                "COMPETITOR CONTEXT ({name}):\n{}\nMention the competitive angle without criticizing {name}.",
                input.competitor_summary
            ));
        }
    }
    if !input.sales_context.trim().is_empty() {
        sections.push(format!("SALES CONTEXT:\n{}", input.sales_context));
    }
    let product = input.product;
    if !product.name.trim().is_empty() {
        sections.push(format!(
            "PRODUCT:\n- Name: {}\n- Description: {}\n- Unique selling point: {}",
            product.name, product.description, product.usp
        ));
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::MockGenerator;
    use std::sync::Arc;

    fn input<'a>(p: &'a Prospect, product: &'a ProductProfile) -> ComposeInput<'a> {
        ComposeInput {
            prospect: p,
            industry: "retail",
            news_summary: "No specific recent news found for Acme.",
            competitor: Some("Globex"),
            competitor_summary: "",
            sales_context: "",
            product,
        }
    }

    #[test]
    fn prompt_falls_back_to_industry_trends() {
        let mut p = Prospect::new("Acme");
        p.prospect_name = "Jane Doe".into();
        let product = ProductProfile::default();
        let prompt = compose_prompt(&input(&p, &product));
        assert!(prompt.contains("Jane Doe at Acme"));
        assert!(prompt.contains("e-commerce"));
        assert!(!prompt.contains("COMPETITOR CONTEXT"));
        assert!(!prompt.contains("PRODUCT:"));
    }

    #[tokio::test]
    async fn failure_becomes_placeholder() {
        let p = Prospect::new("Acme");
        let product = ProductProfile::default();
        let c = PromptComposer::new(Arc::new(MockGenerator::failing()), GenerateOptions::default());
        let out = compose_or_placeholder(&c, &input(&p, &product)).await;
        assert_eq!(out, placeholder(&p));

        let ok = PromptComposer::new(Arc::new(MockGenerator::fixed("Hi Jane")), GenerateOptions::default());
        assert_eq!(compose_or_placeholder(&ok, &input(&p, &product)).await, "Hi Jane");
    }
}
