use std::io::Write;

use nepi_core::{ExtractionResponse, KeyInfo};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print a human-readable summary of an extraction response.
pub fn print_summary(
    w: &mut dyn Write,
    response: &ExtractionResponse,
    color: ColorMode,
) -> std::io::Result<()> {
    if !response.ok {
        let msg = format!(
            "Extraction failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
        if color.enabled() {
            writeln!(w, "{}", msg.red().bold())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
        return Ok(());
    }

    if let Some(meta) = &response.meta {
        writeln!(w, "{} ({}, {} bytes)", meta.filename, meta.content_type, meta.size)?;
    }
    if let Some(method) = response.extraction_method {
        let truncated = if response.truncated == Some(true) { ", truncated" } else { "" };
        let line = format!(
            "Text: {} characters previewed via {}{}",
            response.preview_chars.unwrap_or(0),
            method.as_str(),
            truncated
        );
        if color.enabled() {
            writeln!(w, "{}", line.dimmed())?;
        } else {
            writeln!(w, "{}", line)?;
        }
    }

    if let Some(info) = &response.key_info {
        writeln!(w)?;
        let rows = key_info_rows(info);
        if rows.is_empty() {
            writeln!(w, "No key information found.")?;
        }
        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        for (label, value) in rows {
            if color.enabled() {
                writeln!(w, "  {:<width$}  {}", label.bold(), value.green())?;
            } else {
                writeln!(w, "  {:<width$}  {}", label, value)?;
            }
        }
    }

    if let Some(note) = &response.note {
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "{}", note.yellow())?;
        } else {
            writeln!(w, "Note: {}", note)?;
        }
    }
    Ok(())
}

/// Label/value pairs for the populated fields, in schema order.
fn key_info_rows(info: &KeyInfo) -> Vec<(&'static str, String)> {
    let mut rows = Vec::new();
    let mut text = |label: &'static str, value: &Option<String>| {
        if let Some(v) = value {
            rows.push((label, v.clone()));
        }
    };
    text("NMI", &info.nmi);
    text("MIRN", &info.mirn);
    text("Site", &info.site_name);
    text("Address", &info.site_address);
    text("Billing from", &info.billing_period_start);
    text("Billing to", &info.billing_period_end);

    let quantities = [
        ("Electricity", info.electricity_kwh, "kWh"),
        ("Gas", info.gas_mj, "MJ"),
        ("Water", info.water_kl, "kL"),
        ("Emissions", info.emissions_tco2e, "tCO2e"),
        ("Floor area", info.floor_area_m2, "m2"),
        ("Hours/week", info.operating_hours, "h"),
    ];
    for (label, value, unit) in quantities {
        if let Some(v) = value {
            rows.push((label, format!("{v} {unit}")));
        }
    }

    if let Some(pv) = info.has_pv {
        rows.push(("Solar PV", if pv { "yes" } else { "no" }.to_string()));
    }
    if let Some(risks) = &info.risks {
        rows.push(("Risks", risks.join("; ")));
    }
    rows
}
