use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::format::{FormatResult, KvReader, KvWriter};

/// How a scoring profile's results reach the assessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Formatter {
    /// The host's own result page, shown in a frame. Nothing can be saved.
    Frame { url: String },
    /// Results fetched from the host and rendered as snippets; `selector` picks
    /// result nodes out of the response.
    Snippets { url: String, selector: String },
}

impl Formatter {
    const KEY_TYPE: &'static str = "formatter";
    const KEY_URL: &'static str = "url";
    const KEY_SELECTOR: &'static str = "selector";

    const TYPE_FRAME: &'static str = "frame";
    const TYPE_SNIPPETS: &'static str = "snippets";

    pub fn type_name(&self) -> &'static str {
        match self {
            Formatter::Frame { .. } => Self::TYPE_FRAME,
            Formatter::Snippets { .. } => Self::TYPE_SNIPPETS,
        }
    }

    /// URL template; `{query}` is substituted by the query issuer.
    pub fn url(&self) -> &str {
        match self {
            Formatter::Frame { url } | Formatter::Snippets { url, .. } => url,
        }
    }

    /// Whether this formatter produces snapshots that can be stored.
    pub fn saves_results(&self) -> bool {
        matches!(self, Formatter::Snippets { .. })
    }

    pub fn write_to<W: Write>(&self, writer: &mut KvWriter<W>) -> io::Result<()> {
        writer.write(Self::KEY_TYPE, self.type_name())?;
        match self {
            Formatter::Frame { url } => writer.write(Self::KEY_URL, url),
            Formatter::Snippets { url, selector } => {
                writer.write(Self::KEY_URL, url)?;
                writer.write(Self::KEY_SELECTOR, selector)
            }
        }
    }

    pub fn read_from<R: BufRead>(reader: &mut KvReader<R>) -> FormatResult<Self> {
        let type_name = reader.expect_parsed(Self::KEY_TYPE, |v| match v {
            Self::TYPE_FRAME => Some(Self::TYPE_FRAME),
            Self::TYPE_SNIPPETS => Some(Self::TYPE_SNIPPETS),
            _ => None,
        })?;
        let url = reader.expect(Self::KEY_URL)?;
        if type_name == Self::TYPE_FRAME {
            return Ok(Formatter::Frame { url });
        }
        let selector = reader.expect(Self::KEY_SELECTOR)?;
        Ok(Formatter::Snippets { url, selector })
    }
}

/// A named scoring policy under evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringProfile {
    pub name: String,
    pub formatter: Formatter,
}

impl ScoringProfile {
    pub fn new(name: impl Into<String>, formatter: Formatter) -> Self {
        Self {
            name: name.into(),
            formatter,
        }
    }

    pub fn frame(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, Formatter::Frame { url: url.into() })
    }

    pub fn snippets(
        name: impl Into<String>,
        url: impl Into<String>,
        selector: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            Formatter::Snippets {
                url: url.into(),
                selector: selector.into(),
            },
        )
    }

    /// Writes the name under `name_key` followed by the formatter fields.
    pub fn write_to<W: Write>(&self, writer: &mut KvWriter<W>, name_key: &str) -> io::Result<()> {
        writer.write(name_key, &self.name)?;
        self.formatter.write_to(writer)
    }

    pub fn read_from<R: BufRead>(
        reader: &mut KvReader<R>,
        name_key: &'static str,
    ) -> FormatResult<Self> {
        let name = reader.expect(name_key)?;
        let formatter = Formatter::read_from(reader)?;
        Ok(Self { name, formatter })
    }
}
