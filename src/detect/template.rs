use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::error::{DetectorError, Result};

const BUILTIN_TEMPLATE_JSON: &str = include_str!("../../assets/pop_template.json");

#[derive(Debug, Deserialize)]
struct TemplateFile {
    primary_height: usize,
    columns: usize,
    values: Vec<f32>,
}

/// Reference click profile, laid out column by column like the pop history:
/// `primary_height` spectrum bins followed by one aggregated high-frequency
/// value per column.
#[derive(Debug)]
pub struct PopTemplate {
    values: Vec<f32>,
    primary_height: usize,
    columns: usize,
    max: f32,
}

impl PopTemplate {
    pub fn new(values: Vec<f32>, primary_height: usize, columns: usize) -> Result<Self> {
        if primary_height == 0 || columns == 0 {
            return Err(DetectorError::TemplateShape(format!(
                "{} primary rows x {} columns",
                primary_height, columns
            )));
        }
        let expected = (primary_height + 1) * columns;
        if values.len() != expected {
            return Err(DetectorError::TemplateSize {
                template: values.len(),
                buffer: expected,
            });
        }
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(DetectorError::TemplateShape(
                "values must be finite and non-negative".into(),
            ));
        }
        let max = values.iter().copied().fold(0.0f32, f32::max);
        if max <= 0.0 {
            return Err(DetectorError::TemplateShape("template is all zeros".into()));
        }

        Ok(Self {
            values,
            primary_height,
            columns,
            max,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: TemplateFile = serde_json::from_str(json)?;
        Self::new(file.values, file.primary_height, file.columns)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// The template shipped with the crate, parsed on first use and shared
    /// by every detector afterwards.
    pub fn builtin() -> Result<Arc<PopTemplate>> {
        static BUILTIN: OnceLock<Arc<PopTemplate>> = OnceLock::new();
        if let Some(template) = BUILTIN.get() {
            return Ok(Arc::clone(template));
        }
        let template = Arc::new(Self::from_json(BUILTIN_TEMPLATE_JSON)?);
        Ok(Arc::clone(BUILTIN.get_or_init(|| template)))
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn primary_height(&self) -> usize {
        self.primary_height
    }

    /// Rows per column, including the aggregated high-frequency row.
    pub fn height(&self) -> usize {
        self.primary_height + 1
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Normalized template value compared against history cell `cell` when
    /// the template is moved `shift` rows. Rows pushed outside the primary
    /// bins read as zero; the aggregate row is never moved.
    pub fn normalized_at(&self, cell: usize, shift: isize) -> f32 {
        let row = cell % self.height();
        if row >= self.primary_height {
            return self.values[cell] / self.max;
        }
        let shifted_row = row as isize + shift;
        if shifted_row < 0 || shifted_row >= self.primary_height as isize {
            return 0.0;
        }
        let shifted_cell = (cell as isize + shift) as usize;
        self.values[shifted_cell] / self.max
    }
}
