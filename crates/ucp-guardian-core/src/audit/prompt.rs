const OUTPUT_SCHEMA: &str = r#"{
  "scanId": "string",
  "status": "processing" | "completed" | "failed",
  "scores": {
    "total": number (0-100),
    "discovery": number (0-100),
    "offerClarity": number (0-100),
    "transaction": number (0-100)
  },
  "issues": [
    {
      "severity": "critical" | "warning" | "info",
      "title": "string",
      "description": "string",
      "remediationId": "string (optional)"
    }
  ],
  "artifacts": {
    "manifestContent": object,
    "migrationGuide": "string"
  }
}"#;

const OFFLINE_NOTICE: &str = "Live browsing is unavailable for this audit. Do not attempt to fetch the site. Simulate the audit by reasoning from the URL pattern and standard e-commerce practices alone, and still return the full JSON structure.";

/// Instruction for a full UCP compliance audit of `url`.
pub fn build_audit_prompt(url: &str) -> String {
    format!(
        "You are UCP Guardian, an expert auditor for Universal Commerce Protocol compliance.\n\
         Target URL: {url}\n\
         \n\
         MISSION:\n\
         1. Analyze this storefront's domain structure and purpose.\n\
         2. Assess how well AI shopping agents can discover the store, read its offers (prices, stock) and complete a transaction.\n\
         3. Produce a UCP audit report.\n\
         \n\
         ARTIFACT GENERATION:\n\
         - 'manifestContent': a valid 'ucp.json' manifest object describing the store's agent-facing capabilities and API endpoints.\n\
         - 'migrationGuide': a detailed Markdown guide explaining how to fix every issue found.\n\
         \n\
         OUTPUT FORMAT:\n\
         Return ONLY valid JSON matching this structure, with no commentary before or after it:\n\
         {OUTPUT_SCHEMA}\n"
    )
}

/// Audit instruction for the tool-less fallback attempt.
pub fn build_fallback_prompt(url: &str) -> String {
    format!("{}\n{}", build_audit_prompt(url), OFFLINE_NOTICE)
}

/// Instruction for a single code or markup snippet that fixes one issue.
pub fn build_patch_prompt(url: &str, issue_title: &str, issue_description: &str) -> String {
    format!(
        "You are UCP Guardian, remediating agent-commerce compliance issues.\n\
         Target URL: {url}\n\
         Issue: {issue_title}\n\
         Details: {issue_description}\n\
         \n\
         Write the smallest code or markup change that fixes this issue \
         (for example a ucp.json fragment, a robots.txt rule or a <head> tag).\n\
         Respond with the bare code only: no JSON wrapping, no Markdown fences, no explanation.\n"
    )
}
