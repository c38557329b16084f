//! Text and JSON rendering of a device's parameter table.

use std::fmt::Write as _;

use anvil_protocol::{DeviceParameter, ParamType};
use serde::Serialize;

use crate::error::RunnerResult;

/// Snapshot of a connected device.
#[derive(Debug, Serialize)]
pub struct DeviceReport<'a> {
    /// Port the device answered on.
    pub port: &'a str,
    /// Link baud rate.
    pub baud_rate: u32,
    /// Parameter table in schema order.
    pub parameters: &'a [DeviceParameter],
}

impl<'a> DeviceReport<'a> {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> RunnerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Aligned table for a terminal.
    pub fn to_text(&self) -> String {
        let name_width = self
            .parameters
            .iter()
            .map(|p| p.name.chars().count())
            .max()
            .unwrap_or(0)
            .max(4);

        let mut out = format!("{} @ {} baud\n", self.port, self.baud_rate);
        let _ = writeln!(out, "{:>3}  {:<7}  {:<name_width$}  VALUE", "ID", "TYPE", "NAME");
        for p in self.parameters {
            let _ = writeln!(
                out,
                "{:>3}  {:<7}  {:<name_width$}  {}",
                p.id,
                p.param_type.to_string(),
                p.name,
                format_value(p)
            );
        }
        out.truncate(out.trim_end().len());
        out
    }
}

/// Human-readable value of one parameter.
pub fn format_value(p: &DeviceParameter) -> String {
    match p.param_type {
        ParamType::Toggle if p.value != 0.0 => "on".to_string(),
        ParamType::Toggle => "off".to_string(),
        ParamType::Slider | ParamType::Numeric => format!("{} [{}..{}]", p.value, p.min, p.max),
        ParamType::String => format!("{:?}", p.string_value),
    }
}

/// Port list, one per line or as a JSON array.
pub fn render_ports(ports: &[String], json: bool) -> RunnerResult<String> {
    if json {
        Ok(serde_json::to_string_pretty(ports)?)
    } else {
        Ok(ports.join("\n"))
    }
}
