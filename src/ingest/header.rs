use std::collections::HashMap;

use crate::models::Cell;

/// 逻辑字段 (与表头文本解耦)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    // 产品
    Code,
    TaxId,
    Holder,
    Status,
    Expiration,
    CertificationType,
    RenewalInProgress,
    LegalAddress,
    Manufacturer,
    ManufacturingPlant,
    Origin,
    ProductName,
    Brand,
    Model,
    TechnicalFeatures,
    Standards,
    TestReport,
    Laboratory,
    ForeignOcp,
    ForeignCertificate,
    ForeignCertificateDate,
    AgreementDisposition,
    CategoryCode,
    SubcategoryCode,
    SubcategoryName,
    IssueDate,
    LastSurveillanceDate,
    CancellationDate,
    CancellationReason,
    // 客户
    LegalName,
    TradeName,
    Address,
    PlantAddress,
    Phone,
    Email,
    RepresentativeName,
    RepresentativeAddress,
    RepresentativeTaxId,
    DjcLink,
}

impl LogicalField {
    /// 别名 (已规范化: 大写、去重音)，靠前者优先
    pub fn aliases(&self) -> &'static [&'static str] {
        use LogicalField::*;
        match self {
            Code => &["CODIFICACION", "CODIGO"],
            TaxId => &["CUIT"],
            Holder => &["TITULAR", "EMPRESA"],
            Status => &["ESTADO"],
            Expiration => &["VENCIMIENTO", "FECHA DE VENCIMIENTO", "FECHA VENCIMIENTO"],
            CertificationType => &["TIPO DE CERTIFICACION", "TIPO CERTIFICACION", "TIPO"],
            RenewalInProgress => &["EN PROCESO RENOVACION", "EN PROCESO DE RENOVACION"],
            LegalAddress => &["DIRECCION LEGAL", "DIRECCION LEGAL EMPRESA"],
            Manufacturer => &["FABRICANTE"],
            ManufacturingPlant => &["PLANTA FABRICACION", "PLANTA DE FABRICACION"],
            Origin => &["ORIGEN"],
            ProductName => &["PRODUCTO"],
            Brand => &["MARCA"],
            Model => &["MODELO"],
            TechnicalFeatures => &["CARACTERISTICAS TECNICAS"],
            Standards => &["NORMAS DE APLICACION", "NORMAS"],
            TestReport => &["INFORME ENSAYO NRO", "INFORME DE ENSAYO"],
            Laboratory => &["LABORATORIO"],
            ForeignOcp => &["OCP EXTRANJERO"],
            ForeignCertificate => &["N CERTIFICADO EXTRANJERO", "CERTIFICADO EXTRANJERO NRO"],
            ForeignCertificateDate => &[
                "FECHA EMISION CERTIFICADO EXTRANJERO",
                "FECHA EMISION CERT EXTRANJERO",
            ],
            AgreementDisposition => &["DISPOSICION CONVENIO"],
            CategoryCode => &["COD RUBRO"],
            SubcategoryCode => &["COD SUBRUBRO"],
            SubcategoryName => &["NOMBRE SUBRUBRO"],
            IssueDate => &["FECHA EMISION", "FECHA DE EMISION"],
            LastSurveillanceDate => &["FECHA ULTIMA VIGILANCIA", "FECHA ULTIMA NOTA VIGILANCIA"],
            CancellationDate => &["FECHA CANCELACION", "FECHA DE CANCELACION"],
            CancellationReason => &["MOTIVO CANCELACION"],
            LegalName => &["RAZON SOCIAL"],
            TradeName => &["NOMBRE COMERCIAL", "NOMBRE DE FANTASIA"],
            Address => &["DIRECCION", "DOMICILIO", "DOMICILIO LEGAL"],
            PlantAddress => &["DOMICILIO PLANTA", "DOMICILIO DE PLANTA"],
            Phone => &["TELEFONO"],
            Email => &["EMAIL", "CORREO ELECTRONICO", "CORREO", "E-MAIL"],
            RepresentativeName => &["REPRESENTANTE", "REPRESENTANTE NOMBRE", "NOMBRE REPRESENTANTE"],
            RepresentativeAddress => &["REPRESENTANTE DOMICILIO", "DOMICILIO REPRESENTANTE"],
            RepresentativeTaxId => &["REPRESENTANTE CUIT", "CUIT REPRESENTANTE"],
            DjcLink => &["ENLACE DJC", "DJC"],
        }
    }
}

/// 表头规范化: 大写、去重音、合并空白
pub fn normalize_header(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let folded: String = upper.chars().map(fold_accent).collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_accent(c: char) -> char {
    match c {
        'Á' | 'À' | 'Ä' | 'Â' | 'Ã' => 'A',
        'É' | 'È' | 'Ë' | 'Ê' => 'E',
        'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
        'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' => 'O',
        'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
        'Ñ' => 'N',
        'Ç' => 'C',
        '°' | 'º' => ' ',
        other => other,
    }
}

/// 表头索引: 规范化表头 -> 列号
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    columns: HashMap<String, usize>,
    width: usize,
}

impl HeaderIndex {
    /// 同名表头保留第一次出现的列
    pub fn build(headers: &[String]) -> Self {
        let mut columns = HashMap::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            let key = normalize_header(header);
            if key.is_empty() {
                continue;
            }
            columns.entry(key).or_insert(idx);
        }
        Self {
            columns,
            width: headers.len(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// 按表头文本查找
    pub fn column(&self, header: &str) -> Option<usize> {
        self.columns.get(&normalize_header(header)).copied()
    }

    /// 按逻辑字段查找，列不存在返回 None
    pub fn resolve(&self, field: LogicalField) -> Option<usize> {
        field
            .aliases()
            .iter()
            .find_map(|alias| self.columns.get(*alias).copied())
    }

    pub fn has(&self, field: LogicalField) -> bool {
        self.resolve(field).is_some()
    }
}

/// 取行内逻辑字段的单元格
///
/// 列不存在或该行缺少尾部单元格时返回 None；存在但为空返回 `Some(Cell::Empty)`。
pub fn field<'a>(row: &'a [Cell], index: &HeaderIndex, logical: LogicalField) -> Option<&'a Cell> {
    let column = index.resolve(logical)?;
    assert!(
        column < index.width,
        "header index column {} out of range {}",
        column,
        index.width
    );
    row.get(column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn accents_and_case_are_ignored() {
        assert_eq!(normalize_header("  Codificación "), "CODIFICACION");
        assert_eq!(normalize_header("razón   social"), "RAZON SOCIAL");
        assert_eq!(normalize_header("N° Certificado Extranjero"), "N CERTIFICADO EXTRANJERO");
    }

    #[test]
    fn address_aliases_map_to_one_field() {
        for h in ["DIRECCION", "Dirección", "domicilio", "DOMICILIO LEGAL"] {
            let index = HeaderIndex::build(&headers(&["X", h]));
            assert_eq!(index.resolve(LogicalField::Address), Some(1), "{}", h);
        }
    }

    #[test]
    fn absent_is_distinct_from_empty() {
        let index = HeaderIndex::build(&headers(&["CODIFICACIÓN", "TITULAR"]));
        let row = vec![Cell::Text("ABC".into()), Cell::Empty];
        assert_eq!(field(&row, &index, LogicalField::Holder), Some(&Cell::Empty));
        assert_eq!(field(&row, &index, LogicalField::Status), None);

        let short_row = vec![Cell::Text("ABC".into())];
        assert_eq!(field(&short_row, &index, LogicalField::Holder), None);
    }

    #[test]
    fn first_alias_and_first_column_win() {
        let index = HeaderIndex::build(&headers(&["CODIGO", "CODIFICACION", "CODIFICACIÓN"]));
        assert_eq!(index.resolve(LogicalField::Code), Some(1));
        assert_eq!(index.column("codificacion"), Some(1));
        assert_eq!(index.width(), 3);
    }
}
