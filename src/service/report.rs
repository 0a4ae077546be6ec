use chrono::NaiveDate;
use csv::{ReaderBuilder, Writer};

use crate::models::{Domain, Severity, ValidationFinding};

const REPORT_HEADER: [&str; 4] = ["Tipo", "Mensaje", "Campo", "Fila"];

/// 校验报告文件名
pub fn report_file_name(domain: Domain, date: NaiveDate) -> String {
    format!("validacion_{}_{}.csv", domain, date.format("%Y-%m-%d"))
}

/// 导出校验结果为 CSV (Tipo, Mensaje, Campo, Fila)
pub fn export_csv(findings: &[ValidationFinding]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(REPORT_HEADER)?;

    for finding in findings {
        writer.write_record(&[
            finding.severity.as_str().to_string(),
            finding.message.clone(),
            finding.field.clone().unwrap_or_default(),
            finding.row.map(|r| r.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// 读回导出的报告
pub fn parse_report(bytes: &[u8]) -> Result<Vec<ValidationFinding>, csv::Error> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let mut findings = Vec::new();

    for record in reader.records() {
        let record = record?;
        let get = |i: usize| record.get(i).unwrap_or_default();

        let severity = match get(0) {
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            "success" => Severity::Success,
            other => {
                return Err(csv::Error::from(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unknown finding type: {}", other),
                )))
            }
        };
        let row = match get(3) {
            "" => None,
            n => Some(n.parse::<u32>().map_err(|e| {
                csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            })?),
        };

        findings.push(ValidationFinding {
            severity,
            message: get(1).to_string(),
            field: Some(get(2)).filter(|f| !f.is_empty()).map(str::to_string),
            row,
        });
    }

    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(report_file_name(Domain::Clients, date), "validacion_clients_2025-03-07.csv");
    }

    #[test]
    fn export_and_reimport_preserves_columns() {
        let findings = vec![
            ValidationFinding::error("Fila 2: CUIT vacío (Columna B)").with_field("B").at_row(2),
            ValidationFinding::warning("Fila 3: Dirección, piso \"2\"").with_field("C").at_row(3),
            ValidationFinding::error("Campo requerido faltante: ESTADO").with_field("ESTADO"),
        ];

        let bytes = export_csv(&findings).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("Tipo,Mensaje,Campo,Fila\n"));

        assert_eq!(parse_report(&bytes).unwrap(), findings);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(parse_report(b"Tipo,Mensaje,Campo,Fila\ninfo,x,,\n").is_err());
    }
}
