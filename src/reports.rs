use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::analytics::ScoreSummary;

/// Length of the report period in operative days.
pub const REPORT_DAYS: u32 = 14;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRecipient {
    pub user_id: Uuid,
    pub email: String,
    pub business_name: Option<String>,
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReportRun {
    pub recipients: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub struct BiweeklyReport<'a> {
    pub business_name: &'a str,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub summary: &'a ScoreSummary,
}

impl BiweeklyReport<'_> {
    pub fn render(&self) -> RenderedEmail {
        let summary = self.summary;
        let nps = summary
            .nps
            .map(|nps| format!("{nps:.1}"))
            .unwrap_or_else(|| "sin datos".into());
        let rating = summary
            .average_rating
            .map(|rating| format!("{rating:.2} / 5"))
            .unwrap_or_else(|| "sin datos".into());
        let period = format!(
            "{} al {}",
            self.period_start.format("%d/%m/%Y"),
            self.period_end.format("%d/%m/%Y")
        );

        let subject = format!("{}: tu resumen quincenal de HappyMeter", self.business_name);

        let lines = [
            ("Respuestas", summary.total_responses.to_string()),
            ("NPS", nps),
            ("Calificación promedio", rating),
            ("Promotores", summary.promoters.to_string()),
            ("Detractores", summary.detractors.to_string()),
        ];

        let mut text = format!("Resumen de {} del {}\n\n", self.business_name, period);
        for (label, value) in &lines {
            text.push_str(&format!("{label}: {value}\n"));
        }
        if summary.total_responses == 0 {
            text.push_str("\nNo recibiste respuestas en este periodo. Comparte tu encuesta con tus clientes.\n");
        }

        let mut html = format!(
            "<h2>Resumen de {}</h2><p>Del {}</p><table>",
            escape_html(self.business_name),
            period
        );
        for (label, value) in &lines {
            html.push_str(&format!("<tr><td>{label}</td><td><strong>{}</strong></td></tr>", escape_html(value)));
        }
        html.push_str("</table>");
        if summary.total_responses == 0 {
            html.push_str("<p>No recibiste respuestas en este periodo. Comparte tu encuesta con tus clientes.</p>");
        }

        RenderedEmail { subject, text, html }
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        )
    }

    #[test]
    fn renders_summary_numbers() {
        let summary = ScoreSummary {
            total_responses: 42,
            promoters: 30,
            passives: 7,
            detractors: 5,
            nps: Some(59.5),
            average_rating: Some(4.36),
            daily: Vec::new(),
        };
        let (start, end) = period();
        let email = BiweeklyReport {
            business_name: "Tacos El Güero",
            period_start: start,
            period_end: end,
            summary: &summary,
        }
        .render();

        assert_eq!(email.subject, "Tacos El Güero: tu resumen quincenal de HappyMeter");
        assert!(email.text.contains("Respuestas: 42"));
        assert!(email.text.contains("NPS: 59.5"));
        assert!(email.text.contains("Calificación promedio: 4.36 / 5"));
        assert!(email.text.contains("01/03/2025 al 14/03/2025"));
        assert!(!email.text.contains("No recibiste"));
        assert!(email.html.contains("<strong>42</strong>"));
    }

    #[test]
    fn empty_period_mentions_missing_data() {
        let summary = ScoreSummary::default();
        let (start, end) = period();
        let email = BiweeklyReport {
            business_name: "Bar <Central>",
            period_start: start,
            period_end: end,
            summary: &summary,
        }
        .render();

        assert!(email.text.contains("NPS: sin datos"));
        assert!(email.text.contains("No recibiste respuestas"));
        assert!(email.html.contains("Bar &lt;Central&gt;"));
        assert!(!email.html.contains("<Central>"));
    }
}
