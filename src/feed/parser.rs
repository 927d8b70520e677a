use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::feed::model::{Color, Product, Rejection};
use crate::feed::FeedError;
use crate::normalization::decimal_comma;

/// Outcome of one catalog document: validated records in document order plus
/// one rejection per element that failed validation.
#[derive(Debug, Default)]
pub struct ParsedFeed {
    pub products: Vec<Product>,
    pub rejections: Vec<Rejection>,
}

impl ParsedFeed {
    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Images,
    Details,
}

/// Loosely-typed view of one `<Product>` element before projection. The
/// detail bag never escapes this module.
#[derive(Debug, Default)]
struct RawRecord {
    stock_code: Option<String>,
    name: Option<String>,
    images: Vec<String>,
    details: HashMap<String, String>,
    span_start: usize,
}

fn attr_value(element: &BytesStart<'_>, wanted: &[u8]) -> Option<String> {
    for attr in element.attributes().flatten() {
        if attr.key.as_ref() == wanted {
            return Some(attr.unescape_value().unwrap_or_default().to_string());
        }
    }
    None
}

impl RawRecord {
    fn open(element: &BytesStart<'_>, span_start: usize) -> Self {
        Self {
            stock_code: attr_value(element, b"ProductId"),
            name: attr_value(element, b"Name"),
            span_start,
            ..Self::default()
        }
    }

    /// `Images/Image@Path`; children without a non-empty path are dropped.
    fn push_image(&mut self, element: &BytesStart<'_>) {
        if let Some(path) = attr_value(element, b"Path") {
            if !path.trim().is_empty() {
                self.images.push(path);
            }
        }
    }

    /// `ProductDetails/ProductDetail@Name/@Value`; last write wins on
    /// duplicate names.
    fn push_detail(&mut self, element: &BytesStart<'_>) {
        if let Some(name) = attr_value(element, b"Name") {
            let value = attr_value(element, b"Value").unwrap_or_default();
            self.details.insert(name, value);
        }
    }

    fn detail(&self, key: &str) -> Option<&str> {
        self.details
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    fn optional_detail(&self, key: &str) -> Option<String> {
        self.detail(key).map(str::to_string)
    }

    fn required_detail(&self, key: &str) -> Result<String, String> {
        self.detail(key)
            .map(str::to_string)
            .ok_or_else(|| format!("missing required detail {key}"))
    }

    fn money_detail(&self, key: &str) -> Result<Option<f64>, String> {
        let Some(raw) = self.detail(key) else {
            return Ok(None);
        };
        let value =
            decimal_comma(raw).map_err(|_| format!("invalid {key} value {raw:?}"))?;
        if value < 0.0 {
            return Err(format!("negative {key} value {raw:?}"));
        }
        Ok(Some(value))
    }

    /// Project the loose bag into a typed record. Any missing required field
    /// or out-of-vocabulary token fails the whole record.
    fn project(self, stamp: DateTime<Utc>) -> Result<Product, String> {
        let stock_code = self
            .stock_code
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| "missing required attribute ProductId".to_string())?
            .to_string();
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| "missing required attribute Name".to_string())?
            .to_string();

        let color = match self.detail("Color") {
            None => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(|token| token.parse::<Color>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?,
        };

        let price = self.money_detail("Price")?;
        let discounted_price = self.money_detail("DiscountedPrice")?;

        let quantity_raw = self.required_detail("Quantity")?;
        let quantity = quantity_raw
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid Quantity value {quantity_raw:?}"))?;
        if quantity < 0 {
            return Err(format!("negative Quantity value {quantity}"));
        }

        let price_unit = self.required_detail("PriceUnit")?;
        let product_type = self.required_detail("ProductType")?;
        let series = self.required_detail("Series")?;
        let sample_size = self.optional_detail("SampleSize");
        let status = self.optional_detail("Status");
        let fabric = self.optional_detail("Fabric");
        let model_measurements = self.optional_detail("ModelMeasurements");
        let product_measurements = self.optional_detail("ProductMeasurements");

        Ok(Product {
            stock_code,
            name,
            color,
            price,
            discounted_price,
            is_discounted: discounted_price.is_some_and(|v| v > 0.0),
            images: self.images,
            quantity,
            price_unit,
            product_type,
            series,
            sample_size,
            status,
            fabric,
            model_measurements,
            product_measurements,
            created_at: stamp,
            updated_at: stamp,
        })
    }
}

fn resolve(
    record: RawRecord,
    xml: &str,
    end: usize,
    stamp: DateTime<Utc>,
    out: &mut ParsedFeed,
) {
    let span_start = record.span_start.min(end);
    match record.project(stamp) {
        Ok(product) => out.products.push(product),
        Err(reason) => {
            let source = xml[span_start..end].trim().to_string();
            debug!(%reason, "dropping product record");
            out.rejections.push(Rejection { reason, source });
        }
    }
}

/// Walk one catalog document and extract every `<Product>` element,
/// wherever it sits in the tree. Element-level validation failures are
/// collected as rejections; only ill-formed XML aborts.
pub fn parse_feed(xml: &str) -> Result<ParsedFeed, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = ParsedFeed::default();
    let mut current: Option<RawRecord> = None;
    let mut section = Section::None;
    let stamp = Utc::now();

    loop {
        let cursor = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Product" if current.is_none() => {
                    current = Some(RawRecord::open(&e, cursor));
                    section = Section::None;
                }
                b"Images" if current.is_some() => section = Section::Images,
                b"ProductDetails" if current.is_some() => section = Section::Details,
                b"Image" if section == Section::Images => {
                    if let Some(record) = current.as_mut() {
                        record.push_image(&e);
                    }
                }
                b"ProductDetail" if section == Section::Details => {
                    if let Some(record) = current.as_mut() {
                        record.push_detail(&e);
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"Image" if section == Section::Images => {
                    if let Some(record) = current.as_mut() {
                        record.push_image(&e);
                    }
                }
                b"ProductDetail" if section == Section::Details => {
                    if let Some(record) = current.as_mut() {
                        record.push_detail(&e);
                    }
                }
                b"Product" if current.is_none() => {
                    let record = RawRecord::open(&e, cursor);
                    let end = reader.buffer_position() as usize;
                    resolve(record, xml, end, stamp, &mut out);
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"Images" | b"ProductDetails" => section = Section::None,
                b"Product" => {
                    if let Some(record) = current.take() {
                        let end = reader.buffer_position() as usize;
                        resolve(record, xml, end, stamp, &mut out);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}
