use super::DriftSink;
use crate::drift::ProcessOutcome;
use crate::error::Result;
use crate::models::DriftResult;
use colored::Colorize;

/// Prints a Call/Put x Vega/Theta drift table per processed snapshot
#[derive(Debug, Clone, Default)]
pub struct ConsoleTableSink;

impl ConsoleTableSink {
    pub fn new() -> Self {
        Self
    }
}

/// Plain-text body of the drift table: baseline, current and delta per greek
pub fn render_table(result: &DriftResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<6} {:>12} {:>12} {:>10} {:>12} {:>12} {:>10}\n",
        "Type", "Vega base", "Vega now", "Vega Δ", "Theta base", "Theta now", "Theta Δ"
    ));

    let rows = [
        ("Calls", result.baseline.call, result.current_call, result.call_vega_delta, result.call_theta_delta),
        ("Puts", result.baseline.put, result.current_put, result.put_vega_delta, result.put_theta_delta),
    ];
    for (label, base, now, vega_delta, theta_delta) in rows {
        out.push_str(&format!(
            "{:<6} {:>12.2} {:>12.2} {:>10.2} {:>12.2} {:>12.2} {:>10.2}\n",
            label, base.vega, now.vega, vega_delta, base.theta, now.theta, theta_delta
        ));
    }
    out
}

fn signed(value: f64) -> String {
    let text = format!("{:+.2}", value);
    if value > 0.0 {
        text.green().to_string()
    } else if value < 0.0 {
        text.red().to_string()
    } else {
        text
    }
}

impl DriftSink for ConsoleTableSink {
    fn name(&self) -> &str {
        "console"
    }

    fn emit(&self, outcome: &ProcessOutcome) -> Result<()> {
        match outcome {
            ProcessOutcome::Drift(result) => {
                println!("{}", "-".repeat(40).blue());
                println!("{} {}", "Instrument:".cyan(), result.instrument.to_string().yellow());
                println!(
                    "{} {}",
                    "Baseline at:".cyan(),
                    result.baseline.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                println!("{} {}", "As of:".cyan(), result.as_of.format("%H:%M:%S UTC"));
                println!("{}", "-".repeat(40).blue());
                print!("{}", render_table(result));
                println!(
                    "{} call vega {} theta {} | put vega {} theta {}",
                    "Δ".bold(),
                    signed(result.call_vega_delta),
                    signed(result.call_theta_delta),
                    signed(result.put_vega_delta),
                    signed(result.put_theta_delta)
                );
            }
            ProcessOutcome::SuppressedNoBaseline { instrument, as_of } => {
                println!(
                    "{} {} awaiting baseline ({})",
                    "⏱".yellow(),
                    instrument.to_string().yellow(),
                    as_of.format("%H:%M:%S UTC")
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Baseline, SideAggregate};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_render_table() {
        let at = Utc.with_ymd_and_hms(2024, 10, 7, 4, 0, 0).unwrap();
        let baseline = Baseline {
            call: SideAggregate::new(9.0, 12.0),
            put: SideAggregate::new(2.0, -4.0),
            captured_at: at,
        };
        let result = DriftResult::between(
            "256265:2024-10-10".parse().unwrap(),
            SideAggregate::new(12.0, 11.5),
            SideAggregate::new(1.0, -4.0),
            baseline,
            at,
        );

        let table = render_table(&result);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Vega base") && lines[0].contains("Theta now"));

        let calls: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(calls, vec!["Calls", "9.00", "12.00", "3.00", "12.00", "11.50", "-0.50"]);

        let puts: Vec<&str> = lines[2].split_whitespace().collect();
        assert_eq!(puts, vec!["Puts", "2.00", "1.00", "-1.00", "-4.00", "-4.00", "0.00"]);
    }
}
