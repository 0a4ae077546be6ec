use crate::ingest::{field, HeaderIndex, LogicalField};
use crate::models::{Cell, Domain, RawDataset, Severity, ValidationFinding};

/// 产品必填字段 (逻辑字段, 显示名)
const PRODUCT_REQUIRED: &[(LogicalField, &str)] = &[
    (LogicalField::Code, "CODIFICACIÓN"),
    (LogicalField::TaxId, "CUIT"),
    (LogicalField::Holder, "TITULAR"),
    (LogicalField::Status, "ESTADO"),
    (LogicalField::Expiration, "VENCIMIENTO"),
];

/// 客户文件固定列数: A razón social, B CUIT, C dirección, D email
const CLIENT_MIN_COLUMNS: usize = 4;

/// 校验暂存数据集，结果按行号、行内按字段顺序排列
///
/// 没有任何 error 时在首位插入一条 success。
pub fn validate(dataset: &RawDataset, domain: Domain) -> Vec<ValidationFinding> {
    let mut findings = match domain {
        Domain::Products => validate_products(dataset),
        Domain::Clients => validate_clients(dataset),
    };

    if !findings.iter().any(|f| f.severity == Severity::Error) {
        findings.insert(
            0,
            ValidationFinding::success(format!(
                "Validación completada exitosamente. {} filas procesadas.",
                dataset.rows.len()
            )),
        );
    }
    findings
}

/// 表格行号: 数据行下标 + 表头行 + 1
fn sheet_row(index: usize) -> u32 {
    (index + 2) as u32
}

fn is_blank(cell: Option<&Cell>) -> bool {
    cell.map_or(true, Cell::is_blank)
}

fn validate_products(dataset: &RawDataset) -> Vec<ValidationFinding> {
    let index = HeaderIndex::build(&dataset.headers);
    let mut findings = Vec::new();

    for (logical, name) in PRODUCT_REQUIRED {
        if !index.has(*logical) {
            findings.push(
                ValidationFinding::error(format!("Campo requerido faltante: {}", name)).with_field(*name),
            );
        }
    }

    for (i, row) in dataset.rows.iter().enumerate() {
        let n = sheet_row(i);
        let check = |logical: LogicalField| is_blank(field(row, &index, logical));

        if check(LogicalField::Code) {
            findings.push(
                ValidationFinding::error(format!("Fila {}: Codificación vacía", n))
                    .with_field("CODIFICACIÓN")
                    .at_row(n),
            );
        }
        if check(LogicalField::TaxId) {
            findings.push(
                ValidationFinding::error(format!("Fila {}: CUIT vacío", n))
                    .with_field("CUIT")
                    .at_row(n),
            );
        }
        if check(LogicalField::Holder) {
            findings.push(
                ValidationFinding::warning(format!("Fila {}: Titular vacío", n))
                    .with_field("TITULAR")
                    .at_row(n),
            );
        }
        if check(LogicalField::Status) {
            findings.push(
                ValidationFinding::warning(format!("Fila {}: Estado vacío", n))
                    .with_field("ESTADO")
                    .at_row(n),
            );
        }
        if check(LogicalField::Expiration) {
            findings.push(
                ValidationFinding::warning(format!("Fila {}: Fecha de vencimiento vacía", n))
                    .with_field("VENCIMIENTO")
                    .at_row(n),
            );
        }
    }

    findings
}

/// 客户文件按列位置校验，与表头文本无关
fn validate_clients(dataset: &RawDataset) -> Vec<ValidationFinding> {
    if dataset.headers.len() < CLIENT_MIN_COLUMNS {
        return vec![ValidationFinding::error(
            "El archivo debe tener al menos 4 columnas: Razón Social, CUIT, Dirección, Email",
        )];
    }

    let mut findings = Vec::new();
    for (i, row) in dataset.rows.iter().enumerate() {
        let n = sheet_row(i);
        let column = |c: usize| RawDataset::cell(row, c).and_then(Cell::as_text);

        match column(1) {
            None => findings.push(
                ValidationFinding::error(format!("Fila {}: CUIT vacío (Columna B)", n))
                    .with_field("B")
                    .at_row(n),
            ),
            Some(cuit) => {
                let digits = cuit.chars().filter(|c| c.is_ascii_digit()).count();
                if digits != 11 {
                    findings.push(
                        ValidationFinding::error(format!("Fila {}: CUIT debe tener 11 dígitos (Columna B)", n))
                            .with_field("B")
                            .at_row(n),
                    );
                }
            }
        }

        if column(0).is_none() {
            findings.push(
                ValidationFinding::error(format!("Fila {}: Razón Social vacía (Columna A)", n))
                    .with_field("A")
                    .at_row(n),
            );
        }

        if column(2).is_none() {
            findings.push(
                ValidationFinding::warning(format!("Fila {}: Dirección vacía (Columna C)", n))
                    .with_field("C")
                    .at_row(n),
            );
        }

        match column(3) {
            None => findings.push(
                ValidationFinding::warning(format!("Fila {}: Email vacío (Columna D)", n))
                    .with_field("D")
                    .at_row(n),
            ),
            Some(email) if !email.contains('@') => findings.push(
                ValidationFinding::warning(format!("Fila {}: Formato de email inválido (Columna D)", n))
                    .with_field("D")
                    .at_row(n),
            ),
            Some(_) => {}
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_file;
    use crate::models::SourceKind;

    fn text_rows(rows: &[&[&str]]) -> Vec<Vec<Cell>> {
        rows.iter()
            .map(|r| r.iter().map(|c| Cell::Text(c.to_string())).collect())
            .collect()
    }

    fn dataset(headers: &[&str], rows: &[&[&str]]) -> RawDataset {
        RawDataset::new(
            headers.iter().map(|h| h.to_string()).collect(),
            text_rows(rows),
            "test.csv",
            SourceKind::Csv,
        )
    }

    #[test]
    fn clean_product_file_yields_single_success() {
        let csv = "CODIFICACIÓN,CUIT,TITULAR,ESTADO,VENCIMIENTO\n\"ABC-1\",\"30698914277\",\"Acme\",\"VIGENTE\",\"2099-01-01\"\n";
        let ds = parse_file("productos.csv", csv.as_bytes()).unwrap();
        let findings = validate(&ds, Domain::Products);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Success);
        assert!(findings[0].message.contains("1 filas procesadas"));
    }

    #[test]
    fn unaccented_and_alias_headers_are_accepted() {
        let ds = dataset(
            &["Codificacion", "cuit", "Titular", "Estado", "Fecha de Vencimiento"],
            &[&["X", "30698914277", "Acme", "VIGENTE", "2099-01-01"]],
        );
        let findings = validate(&ds, Domain::Products);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Success);
    }

    #[test]
    fn missing_product_columns_are_reported_first() {
        let ds = dataset(&["CODIFICACIÓN", "TITULAR"], &[&["A-1", "Acme"]]);
        let findings = validate(&ds, Domain::Products);

        let header_errors: Vec<_> = findings.iter().take(3).map(|f| f.field.as_deref()).collect();
        assert_eq!(header_errors, vec![Some("CUIT"), Some("ESTADO"), Some("VENCIMIENTO")]);
        assert!(findings[..3].iter().all(|f| f.row.is_none() && f.severity == Severity::Error));

        // 行级: CUIT 列缺失 -> error，ESTADO / VENCIMIENTO -> warning
        let row_findings: Vec<_> = findings[3..].iter().map(|f| (f.severity, f.row)).collect();
        assert_eq!(
            row_findings,
            vec![
                (Severity::Error, Some(2)),
                (Severity::Warning, Some(2)),
                (Severity::Warning, Some(2)),
            ]
        );
        assert!(findings.iter().all(|f| f.severity != Severity::Success));
    }

    #[test]
    fn every_row_is_checked_once_per_required_field() {
        let ds = dataset(
            &["CODIFICACIÓN", "CUIT", "TITULAR", "ESTADO", "VENCIMIENTO"],
            &[&["", "", "", "", ""], &["", " ", "", "", ""], &[]],
        );
        let findings = validate(&ds, Domain::Products);
        assert_eq!(findings.len(), 15);
        for (i, chunk) in findings.chunks(5).enumerate() {
            assert!(chunk.iter().all(|f| f.row == Some(i as u32 + 2)));
            let severities: Vec<_> = chunk.iter().map(|f| f.severity).collect();
            assert_eq!(
                severities,
                vec![
                    Severity::Error,
                    Severity::Error,
                    Severity::Warning,
                    Severity::Warning,
                    Severity::Warning
                ]
            );
        }
    }

    #[test]
    fn blank_client_name_is_one_error_on_column_a() {
        let ds = dataset(
            &["Razón Social", "CUIT", "Dirección", "Email"],
            &[&["", "30698914277", "Av. Siempreviva 123", "a@b.com"]],
        );
        let findings = validate(&ds, Domain::Clients);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert!(findings[0].message.contains("Columna A"));
        assert_eq!(findings[0].row, Some(2));
    }

    #[test]
    fn client_validation_is_positional() {
        // 表头文字无关，只看列位置
        let ds = dataset(
            &["x", "y", "z", "w"],
            &[
                &["Acme", "30-69891427-7", "Calle 1", "sin-arroba"],
                &["Beta", "123", "", ""],
            ],
        );
        let findings = validate(&ds, Domain::Clients);
        let messages: Vec<_> = findings.iter().map(|f| (f.severity, f.row, f.field.clone())).collect();
        assert_eq!(
            messages,
            vec![
                (Severity::Warning, Some(2), Some("D".to_string())),
                (Severity::Error, Some(3), Some("B".to_string())),
                (Severity::Warning, Some(3), Some("C".to_string())),
                (Severity::Warning, Some(3), Some("D".to_string())),
            ]
        );
    }

    #[test]
    fn client_file_with_too_few_columns() {
        let ds = dataset(&["Razón Social", "CUIT"], &[&["", ""]]);
        let findings = validate(&ds, Domain::Clients);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(findings[0].row, None);
    }

    #[test]
    fn warnings_only_still_get_success_first() {
        let ds = dataset(&["A", "B", "C", "D"], &[&["Acme", "30698914277", "", ""]]);
        let findings = validate(&ds, Domain::Clients);
        assert_eq!(findings[0].severity, Severity::Success);
        assert_eq!(findings.len(), 3);
    }
}
