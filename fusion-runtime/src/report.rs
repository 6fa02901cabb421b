//! Report rendering
//!
//! Three views of one enrichment: a terminal summary, a machine-readable
//! JSON document, and a standalone HTML page.

use serde_json::json;
use std::fmt;

use fusion_core::{Indicator, ProviderResult, ResultSet, RiskScore, SeverityTier};

const RULE: &str = "════════════════════════════════════════════════════════════";

/// Complete enrichment document: `{indicator, risk_score, results, metadata}`
pub fn render_json(
    indicator: &Indicator,
    results: &ResultSet,
    risk: &RiskScore,
) -> Result<String, serde_json::Error> {
    let document = json!({
        "indicator": indicator,
        "risk_score": risk,
        "results": results.iter().collect::<Vec<_>>(),
        "metadata": results.metadata(),
    });
    serde_json::to_string_pretty(&document)
}

/// Human-readable terminal summary
pub fn render_text(indicator: &Indicator, results: &ResultSet, risk: &RiskScore) -> String {
    TextReport::new(indicator, results, risk).to_string()
}

/// Standalone HTML report. All provider-derived text is escaped.
pub fn render_html(indicator: &Indicator, results: &ResultSet, risk: &RiskScore) -> String {
    HtmlReport::new(indicator, results, risk).to_string()
}

/// Terminal view of one enrichment
pub struct TextReport<'a> {
    indicator: &'a Indicator,
    results: &'a ResultSet,
    risk: &'a RiskScore,
}

impl<'a> TextReport<'a> {
    pub fn new(indicator: &'a Indicator, results: &'a ResultSet, risk: &'a RiskScore) -> Self {
        Self {
            indicator,
            results,
            risk,
        }
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (indicator, results, risk) = (self.indicator, self.results, self.risk);

        writeln!(f, "{}", RULE)?;
        writeln!(f, " 🛡️  ThreatFusion Report")?;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "Indicator:  {} ({}{})",
            indicator.value,
            indicator.indicator_type,
            if indicator.is_private { ", private" } else { "" }
        )?;
        writeln!(
            f,
            "Risk score: {:.1}/{:.0} {} {}",
            risk.score,
            risk.max,
            risk.severity.emoji(),
            risk.severity
        )?;
        writeln!(f, "Confidence: {:.0}%", risk.confidence * 100.0)?;

        if results.no_applicable_providers() {
            return writeln!(f, "\n⚠️  No providers support this indicator type");
        }

        if !risk.components.is_empty() {
            writeln!(f, "\n📊 Score breakdown")?;
            for c in &risk.components {
                writeln!(
                    f,
                    "   {:<12} {:>5.2} / {:<4.1} {}",
                    c.source, c.points, c.max_points, c.explanation
                )?;
            }
        }

        writeln!(f, "\n📡 Sources")?;
        for result in results {
            writeln!(f, "   {}", source_line(result))?;
        }

        let meta = results.metadata();
        writeln!(
            f,
            "\n⏱️  {}/{} providers succeeded in {:.2}s",
            meta.providers_succeeded,
            meta.providers_queried,
            meta.total_execution_time.as_secs_f64()
        )
    }
}

fn source_line(result: &ProviderResult) -> String {
    match (&result.error_message, result.is_success()) {
        (_, true) => format!("✅ {}", result.provider_name),
        (Some(msg), false) => format!("❌ {}: {}", result.provider_name, msg),
        (None, false) => format!("❌ {}", result.provider_name),
    }
}

/// Escape text for HTML element content and attribute values
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn severity_color(severity: SeverityTier) -> &'static str {
    match severity {
        SeverityTier::Low => "#2e7d32",
        SeverityTier::Medium => "#f9a825",
        SeverityTier::High => "#ef6c00",
        SeverityTier::Critical => "#c62828",
    }
}

/// HTML page for one enrichment
pub struct HtmlReport<'a> {
    indicator: &'a Indicator,
    results: &'a ResultSet,
    risk: &'a RiskScore,
}

impl<'a> HtmlReport<'a> {
    pub fn new(indicator: &'a Indicator, results: &'a ResultSet, risk: &'a RiskScore) -> Self {
        Self {
            indicator,
            results,
            risk,
        }
    }

    fn write_sources(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<h2>Sources</h2>")?;
        if self.results.no_applicable_providers() {
            writeln!(f, "<p>No providers support this indicator type.</p>")?;
        }
        for result in self.results {
            let name = escape_html(&result.provider_name);
            if result.is_success() {
                let body = serde_json::to_string_pretty(&result.payload).unwrap_or_default();
                writeln!(f, "<h3 class=\"ok\">{}</h3>", name)?;
                writeln!(f, "<pre>{}</pre>", escape_html(&body))?;
            } else {
                writeln!(f, "<h3 class=\"err\">{}</h3>", name)?;
                writeln!(
                    f,
                    "<p class=\"err\">{}</p>",
                    escape_html(result.error_message.as_deref().unwrap_or("error"))
                )?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for HtmlReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (indicator, results, risk) = (self.indicator, self.results, self.risk);
        let title = format!("ThreatFusion Report - {}", escape_html(&indicator.value));

        writeln!(f, "<!DOCTYPE html>")?;
        writeln!(f, "<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">")?;
        writeln!(f, "<title>{}</title>", title)?;
        writeln!(
            f,
            "<style>\
body{{font-family:sans-serif;margin:2em;color:#222}}\
table{{border-collapse:collapse;margin-bottom:1.5em}}\
th,td{{border:1px solid #ccc;padding:4px 10px;text-align:left}}\
.score{{font-size:2em;font-weight:bold}}\
.ok{{color:#2e7d32}}.err{{color:#c62828}}\
pre{{background:#f5f5f5;padding:8px;overflow-x:auto}}\
</style>"
        )?;
        writeln!(f, "</head>\n<body>")?;
        writeln!(f, "<h1>{}</h1>", title)?;

        writeln!(
            f,
            "<p>Type: <code>{}</code>{}</p>",
            indicator.indicator_type,
            if indicator.is_private { " (private address)" } else { "" }
        )?;
        writeln!(
            f,
            "<p class=\"score\" style=\"color:{}\">{:.1} / {:.0} {}</p>",
            severity_color(risk.severity),
            risk.score,
            risk.max,
            risk.severity
        )?;
        writeln!(f, "<p>Confidence: {:.0}%</p>", risk.confidence * 100.0)?;

        if !risk.components.is_empty() {
            writeln!(f, "<h2>Score breakdown</h2>\n<table>")?;
            writeln!(f, "<tr><th>Source</th><th>Points</th><th>Details</th></tr>")?;
            for c in &risk.components {
                writeln!(
                    f,
                    "<tr><td>{}</td><td>{:.2} / {:.1}</td><td>{}</td></tr>",
                    escape_html(&c.source),
                    c.points,
                    c.max_points,
                    escape_html(&c.explanation)
                )?;
            }
            writeln!(f, "</table>")?;
        }

        self.write_sources(f)?;

        let meta = results.metadata();
        writeln!(
            f,
            "<footer><p>{}/{} providers succeeded in {:.2}s</p></footer>",
            meta.providers_succeeded,
            meta.providers_queried,
            meta.total_execution_time.as_secs_f64()
        )?;
        writeln!(f, "</body>\n</html>")
    }
}

/// Default file name for a saved HTML report
pub fn default_report_path(indicator: &str) -> String {
    format!(
        "threatfusion_report_{}.html",
        indicator.replace([':', '/'], "_")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate_risk;
    use fusion_core::{Payload, ProviderResult};
    use serde_json::Value;
    use std::fmt::Write;
    use std::time::Duration;

    fn fixture() -> (Indicator, ResultSet) {
        let indicator = Indicator::parse("8.8.8.8").unwrap();
        let mut payload = Payload::new();
        payload.insert("detections".to_string(), json!(3));
        payload.insert("total".to_string(), json!(10));
        payload.insert("note".to_string(), json!("<script>alert(1)</script>"));

        let mut results = ResultSet::new();
        results.insert(ProviderResult::success("VirusTotal", "8.8.8.8", payload));
        results.insert(ProviderResult::error("Shodan", "8.8.8.8", "HTTP 500 <oops>"));
        (indicator, results.finalize(Duration::from_millis(1200), 2))
    }

    #[test]
    fn test_json_document_shape() {
        let (indicator, results) = fixture();
        let risk = calculate_risk(&results);
        let doc: Value = serde_json::from_str(&render_json(&indicator, &results, &risk).unwrap())
            .unwrap();

        assert_eq!(doc["indicator"]["value"], "8.8.8.8");
        assert_eq!(doc["indicator"]["type"], "ip_v4");
        assert_eq!(doc["risk_score"]["score"], 1.5);
        assert_eq!(doc["risk_score"]["severity"], "LOW");
        assert_eq!(doc["results"].as_array().unwrap().len(), 2);
        assert_eq!(doc["results"][1]["status"], "error");
        assert_eq!(doc["metadata"]["execution_time"], 1.2);
        assert_eq!(doc["metadata"]["providers_queried"], 2);
        assert_eq!(doc["metadata"]["providers_succeeded"], 1);
    }

    #[test]
    fn test_text_report() {
        let (indicator, results) = fixture();
        let risk = calculate_risk(&results);
        let text = render_text(&indicator, &results, &risk);

        assert!(text.contains("Indicator:  8.8.8.8 (ip_v4)"));
        assert!(text.contains("Risk score: 1.5/10"));
        assert!(text.contains("3/10 engines flagged as malicious"));
        assert!(text.contains("✅ VirusTotal"));
        assert!(text.contains("❌ Shodan: HTTP 500 <oops>"));
        assert!(text.contains("1/2 providers succeeded in 1.20s"));
    }

    #[test]
    fn test_text_report_without_providers() {
        let indicator = Indicator::parse("user@example.com").unwrap();
        let results = ResultSet::new().finalize(Duration::ZERO, 0);
        let risk = calculate_risk(&results);
        let text = render_text(&indicator, &results, &risk);

        assert!(text.contains("No providers support this indicator type"));
        assert!(text.contains("Confidence: 0%"));
    }

    #[test]
    fn test_html_escapes_provider_content() {
        let (indicator, results) = fixture();
        let risk = calculate_risk(&results);
        let html = render_html(&indicator, &results, &risk);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("HTTP 500 &lt;oops&gt;"));
        assert!(html.contains("LOW"));
    }

    #[test]
    fn test_reports_write_into_any_formatter() {
        let (indicator, results) = fixture();
        let risk = calculate_risk(&results);

        let mut text = String::new();
        write!(text, "{}", TextReport::new(&indicator, &results, &risk)).unwrap();
        assert_eq!(text, render_text(&indicator, &results, &risk));
        assert!(text.starts_with(RULE));
        assert!(text.ends_with("1/2 providers succeeded in 1.20s\n"));

        let mut html = String::new();
        write!(html, "{}", HtmlReport::new(&indicator, &results, &risk)).unwrap();
        assert_eq!(html, render_html(&indicator, &results, &risk));
        assert!(html.ends_with("</body>\n</html>\n"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_default_report_path() {
        assert_eq!(
            default_report_path("http://evil.example/a"),
            "threatfusion_report_http___evil.example_a.html"
        );
        assert_eq!(
            default_report_path("2001:db8::1"),
            "threatfusion_report_2001_db8__1.html"
        );
    }
}
