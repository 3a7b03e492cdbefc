//! `checkVat` SOAP request/response codec.

use crate::core::VatError;
use crate::xml::{SOAP_ENV_NS, XmlNode, XmlWriter, path_ends_with, walk};

const CHECK_VAT_NS: &str = "urn:ec.europa.eu:taxud:vies:services:checkVat:types";

/// Decoded `checkVatResponse`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckVatResponse {
    pub country_code: String,
    pub vat_number: String,
    pub request_date: Option<String>,
    pub valid: bool,
    pub name: Option<String>,
    pub address: Option<String>,
}

/// Build the `checkVat` envelope for `country_code` + national `vat_number`.
pub fn check_vat_request(country_code: &str, vat_number: &str) -> Result<String, VatError> {
    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        "soapenv:Envelope",
        &[("xmlns:soapenv", SOAP_ENV_NS), ("xmlns:urn", CHECK_VAT_NS)],
    )?;
    w.empty_element("soapenv:Header")?;
    w.start_element("soapenv:Body")?;
    w.start_element("urn:checkVat")?;
    w.text_element("urn:countryCode", country_code)?;
    w.text_element("urn:vatNumber", vat_number)?;
    w.end_element("urn:checkVat")?;
    w.end_element("soapenv:Body")?;
    w.end_element("soapenv:Envelope")?;
    w.into_string()
}

/// Parse a `checkVatResponse`, turning SOAP faults into [`VatError::SoapFault`].
pub fn parse_check_vat_response(xml: &str) -> Result<CheckVatResponse, VatError> {
    let mut resp = CheckVatResponse::default();
    let mut valid: Option<String> = None;
    let mut fault: Option<String> = None;
    let mut seen_response = false;

    walk(xml, |node| match node {
        XmlNode::Text { path, text } => {
            if path_ends_with(path, &["Fault", "faultstring"]) {
                fault = Some(text.to_string());
                return;
            }
            if path.len() < 2 || path[path.len() - 2] != "checkVatResponse" {
                return;
            }
            match path[path.len() - 1].as_str() {
                "countryCode" => resp.country_code = text.to_string(),
                "vatNumber" => resp.vat_number = text.to_string(),
                "requestDate" => resp.request_date = Some(text.to_string()),
                "valid" => valid = Some(text.to_string()),
                "name" => resp.name = present(text),
                "address" => resp.address = present(text),
                _ => {}
            }
        }
        XmlNode::End { path } => {
            if path_ends_with(path, &["checkVatResponse"]) {
                seen_response = true;
            }
        }
    })?;

    if let Some(fault) = fault {
        return Err(VatError::SoapFault(fault));
    }
    if !seen_response {
        return Err(VatError::Parse("no checkVatResponse element".into()));
    }

    resp.valid = match valid.as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(other) => {
            return Err(VatError::Parse(format!("unexpected <valid> value '{other}'")));
        }
        None => return Err(VatError::Parse("missing <valid> element".into())),
    };

    Ok(resp)
}

/// VIES reports unknown names and addresses as `---`.
fn present(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || text == "---" {
        None
    } else {
        Some(text.to_string())
    }
}
