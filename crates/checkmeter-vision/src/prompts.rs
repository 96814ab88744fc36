//! Instruction text sent to the vision model

use checkmeter_core::{Error, LabelVocabulary, Result, Tier};
use std::path::Path;

/// System instructions per tier
#[derive(Debug, Clone)]
pub struct InstructionSet {
    standard: String,
    detailed: String,
}

impl InstructionSet {
    /// Built-in instructions using the configured label text
    pub fn new(labels: &LabelVocabulary) -> Self {
        let base = format!(
            "You are an expert in UK electricity metering. Decide whether the photo shows a \
Radio Teleswitch Service (RTS) meter. RTS installations usually have a separate black or \
grey teleswitch box next to the meter, often with a red button, a radio receiver label, or \
markings such as \"Radio Teleswitch\" or \"RTS\". Treat any plausible RTS evidence as a \
positive. If the photo itself stops you from deciding, say so explicitly, for example that \
it is blurry, too dark, partially visible or has glare.\n\n\
Reply with a single JSON object and nothing else, using these fields:\n\
- \"result\": exactly \"{positive}\" or \"{negative}\"\n\
- \"certainty\": your confidence as a percentage from 0 to 100\n\
- \"explanation\": one or two sentences for the customer\n\
- \"reasoning\": the visual evidence you relied on\n\
- \"meterType\": the meter type if you can tell\n\
- \"additionalInfo\": anything else the customer should know",
            positive = labels.positive,
            negative = labels.negative,
        );

        let detailed = format!(
            "{}\n- \"detailedReport\": a thorough Markdown report covering meter identification, \
manufacturing markings, model numbers, any visible utility company details, and what the \
customer should do next",
            base
        );

        Self {
            standard: base,
            detailed,
        }
    }

    /// Instructions loaded from a file, used for both tiers.
    ///
    /// The detailed tier still gets the built-in report addendum unless the
    /// file already asks for `detailedReport`.
    pub fn from_file(path: impl AsRef<Path>, labels: &LabelVocabulary) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read prompt file {}: {}", path.display(), e))
        })?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(Error::config(format!("Prompt file {} is empty", path.display())));
        }

        let detailed = if text.contains("detailedReport") {
            text.clone()
        } else {
            let builtin = Self::new(labels);
            let addendum = builtin
                .detailed
                .strip_prefix(builtin.standard.as_str())
                .unwrap_or_default()
                .to_string();
            format!("{}{}", text, addendum)
        };

        Ok(Self {
            standard: text,
            detailed,
        })
    }

    pub fn for_tier(&self, tier: Tier) -> &str {
        match tier {
            Tier::Standard => &self.standard,
            Tier::Detailed => &self.detailed,
        }
    }
}
