use super::snapshot::PipelineSnapshot;
use crate::error::Result;

use std::fs;
use std::path::Path;

/// Labeled rows in export order: one row per series, label first.
pub fn labeled_rows(snapshot: &PipelineSnapshot) -> Vec<(&'static str, Vec<f64>)> {
    let s = snapshot;
    vec![
        ("frequency", vec![s.frequency]),
        ("current_time", s.current_time.clone()),
        ("voltage_time", s.voltage_time.clone()),
        ("line_voltage_uv", s.line_voltages.u.clone()),
        ("line_voltage_vw", s.line_voltages.v.clone()),
        ("line_voltage_wu", s.line_voltages.w.clone()),
        ("voltage_d", s.voltage_dq0.d.clone()),
        ("voltage_q", s.voltage_dq0.q.clone()),
        ("voltage_zero", s.voltage_dq0.zero.clone()),
        ("phase_voltage_u", s.phase_voltages.u.clone()),
        ("phase_voltage_v", s.phase_voltages.v.clone()),
        ("phase_voltage_w", s.phase_voltages.w.clone()),
        ("current_u", s.phase_currents.u.clone()),
        ("current_v", s.phase_currents.v.clone()),
        ("current_w", s.phase_currents.w.clone()),
        ("current_d", s.current_dq0.d.clone()),
        ("current_q", s.current_dq0.q.clone()),
        ("current_zero", s.current_dq0.zero.clone()),
        ("speed_history", s.histories.speed.clone()),
        ("reference_history", s.histories.reference.clone()),
        ("voltage_d_history", s.histories.voltage.d.clone()),
        ("voltage_q_history", s.histories.voltage.q.clone()),
        ("voltage_zero_history", s.histories.voltage.zero.clone()),
        ("current_d_history", s.histories.current.d.clone()),
        ("current_q_history", s.histories.current.q.clone()),
        ("current_zero_history", s.histories.current.zero.clone()),
        ("hall_time", s.hall.time.clone()),
        ("hall_a", s.hall.a.clone()),
        ("hall_b", s.hall.b.clone()),
        ("hall_c", s.hall.c.clone()),
        ("encoder_time", s.encoder.time.clone()),
        ("encoder_a", s.encoder.a.clone()),
        ("encoder_b", s.encoder.b.clone()),
        ("encoder_index", s.encoder.index.clone()),
    ]
}

/// Writes `snapshot` to `path` as ragged CSV, preceded by an export
/// timestamp row. Parent directories are created as needed.
pub fn write_csv(snapshot: &PipelineSnapshot, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    let exported_at = chrono::Utc::now().to_rfc3339();
    writer.write_record(["exported_at", exported_at.as_str()])?;
    for (label, values) in labeled_rows(snapshot) {
        let mut record = Vec::with_capacity(values.len() + 1);
        record.push(label.to_string());
        record.extend(values.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    log::info!("exported pass {} to {}", snapshot.pass, path.display());
    Ok(())
}
