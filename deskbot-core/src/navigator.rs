//! Menu navigation over the catalog
//!
//! Pure functions from catalog + path to menu contents. Navigation is
//! stateless: the caller carries the already-chosen path inside its callback
//! payload and supplies it on every request, so there is no per-user
//! navigation stack anywhere in the process.

use crate::catalog::DeviceCatalog;
use crate::error::{Error, Result};
use crate::types::{MenuButton, Solution};

/// Read-only view over the catalog that answers menu queries.
#[derive(Debug, Clone, Copy)]
pub struct Navigator<'a> {
    catalog: &'a DeviceCatalog,
}

impl<'a> Navigator<'a> {
    pub fn new(catalog: &'a DeviceCatalog) -> Self {
        Self { catalog }
    }

    /// Top-level menu: `(device_key, display_name)` in catalog order.
    pub fn list_devices(&self) -> Vec<(&'a str, &'a str)> {
        self.catalog
            .devices()
            .iter()
            .map(|(key, device)| (key.as_str(), device.display_name.as_str()))
            .collect()
    }

    /// Models of one device: `(model_key, display_name)` in catalog order.
    pub fn list_models(&self, device: &str) -> Result<Vec<(&'a str, &'a str)>> {
        let dev = self
            .catalog
            .device(device)
            .ok_or_else(|| Error::DeviceNotFound(device.to_string()))?;
        Ok(dev
            .models
            .iter()
            .map(|(key, model)| (key.as_str(), model.display_name.as_str()))
            .collect())
    }

    /// Serial numbers of one model, in catalog order.
    pub fn list_numbers(&self, device: &str, model: &str) -> Result<Vec<&'a str>> {
        let dev = self
            .catalog
            .device(device)
            .ok_or_else(|| Error::DeviceNotFound(device.to_string()))?;
        let mdl = dev
            .model(model)
            .ok_or_else(|| Error::ModelNotFound(format!("{}/{}", device, model)))?;
        Ok(mdl.numbers.iter().map(String::as_str).collect())
    }

    /// Questions for a full path: override-table entries first, then the
    /// device's common questions. An override shadows a common question with
    /// the same text; the result never repeats a question.
    pub fn list_questions(&self, device: &str, model: &str, number: &str) -> Result<Vec<&'a str>> {
        let dev = self
            .catalog
            .device(device)
            .ok_or_else(|| Error::DeviceNotFound(device.to_string()))?;
        let mdl = dev
            .model(model)
            .ok_or_else(|| Error::ModelNotFound(format!("{}/{}", device, model)))?;
        if !mdl.numbers.iter().any(|n| n == number) {
            return Err(Error::NumberNotFound(format!(
                "{}/{}/{}",
                device, model, number
            )));
        }

        let overrides = self
            .catalog
            .overrides_for(device, model, number)
            .unwrap_or(&[]);

        let mut questions: Vec<&'a str> =
            overrides.iter().map(|(text, _)| text.as_str()).collect();
        for (text, _) in &dev.common_questions {
            if !questions.contains(&text.as_str()) {
                questions.push(text.as_str());
            }
        }
        Ok(questions)
    }

    /// Resolve a question to its solution, override table first.
    pub fn resolve_solution(
        &self,
        device: &str,
        model: &str,
        number: &str,
        question: &str,
    ) -> Result<&'a Solution> {
        let dev = self
            .catalog
            .device(device)
            .ok_or_else(|| Error::DeviceNotFound(device.to_string()))?;

        if let Some(overrides) = self.catalog.overrides_for(device, model, number) {
            if let Some((_, solution)) = overrides.iter().find(|(text, _)| text == question) {
                return Ok(solution);
            }
        }

        dev.common_question(question)
            .ok_or_else(|| Error::QuestionNotFound(question.to_string()))
    }
}

/// Group menu buttons two per row (trailing single row when the count is
/// odd), then append one navigation row holding only the back button.
///
/// Callers delivering to a chat transport must keep this grouping as-is to
/// stay layout-compatible with existing deployments.
pub fn menu_rows(buttons: Vec<MenuButton>, back: MenuButton) -> Vec<Vec<MenuButton>> {
    let mut rows: Vec<Vec<MenuButton>> = buttons.chunks(2).map(|pair| pair.to_vec()).collect();
    rows.push(vec![back]);
    rows
}

/// Single-button-per-row layout used for serial numbers, plus the back row.
pub fn single_column_rows(buttons: Vec<MenuButton>, back: MenuButton) -> Vec<Vec<MenuButton>> {
    let mut rows: Vec<Vec<MenuButton>> = buttons.into_iter().map(|b| vec![b]).collect();
    rows.push(vec![back]);
    rows
}
