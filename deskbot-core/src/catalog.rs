//! Static device catalog
//!
//! The catalog is the menu tree: devices, their models, serial numbers, and
//! authored solutions. It is loaded once at startup and shared read-only by
//! every session. Entry order is menu order, so the tree is stored as
//! ordered sequences of keyed entries rather than maps.
//!
//! Solutions are looked up with override precedence: a per-(device, model,
//! number) override table is checked first, falling back to the device's
//! common questions. Overrides shadow common questions of identical text.

use crate::error::{Error, Result};
use crate::types::{ContentKind, Solution};
use serde::Deserialize;
use std::path::Path;

/// One device model and its serial numbers.
#[derive(Debug, Clone)]
pub struct DeviceModel {
    /// Human-friendly name shown on the button
    pub display_name: String,
    /// Serial numbers in menu order; assumed free of the payload separator
    pub numbers: Vec<String>,
}

/// One device type: models plus questions common to every model/number.
#[derive(Debug, Clone)]
pub struct Device {
    pub display_name: String,
    /// `model_key → DeviceModel`, in menu order
    pub models: Vec<(String, DeviceModel)>,
    /// `question_text → Solution`, in menu order
    pub common_questions: Vec<(String, Solution)>,
}

impl Device {
    /// Look up a model by key.
    pub fn model(&self, key: &str) -> Option<&DeviceModel> {
        self.models.iter().find(|(k, _)| k == key).map(|(_, m)| m)
    }

    /// Look up a common question by exact text.
    pub fn common_question(&self, text: &str) -> Option<&Solution> {
        self.common_questions
            .iter()
            .find(|(q, _)| q == text)
            .map(|(_, s)| s)
    }
}

/// Immutable device/model/number/question tree.
#[derive(Debug, Clone)]
pub struct DeviceCatalog {
    devices: Vec<(String, Device)>,
    /// Per-(device, model, number) question overrides
    overrides: Vec<((String, String, String), Vec<(String, Solution)>)>,
}

impl DeviceCatalog {
    /// All devices in menu order.
    pub fn devices(&self) -> &[(String, Device)] {
        &self.devices
    }

    /// Look up a device by key.
    pub fn device(&self, key: &str) -> Option<&Device> {
        self.devices.iter().find(|(k, _)| k == key).map(|(_, d)| d)
    }

    /// Override table for a full path, if one exists.
    pub fn overrides_for(
        &self,
        device: &str,
        model: &str,
        number: &str,
    ) -> Option<&[(String, Solution)]> {
        self.overrides
            .iter()
            .find(|((d, m, n), _)| d == device && m == model && n == number)
            .map(|(_, qs)| qs.as_slice())
    }

    /// Load a catalog from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Catalog(format!("failed to read {:?}: {}", path, e)))?;
        Self::from_toml(&content)
    }

    /// Parse a catalog from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let raw: RawCatalog =
            toml::from_str(text).map_err(|e| Error::Catalog(format!("parse failure: {}", e)))?;
        raw.build()
    }

    /// The production catalog compiled into the binary, used when no
    /// catalog file is configured.
    pub fn builtin() -> Self {
        let scanner = Device {
            display_name: "Сканер".to_string(),
            models: vec![
                (
                    "netum".to_string(),
                    DeviceModel {
                        display_name: "Netum".to_string(),
                        numbers: vec!["C750".to_string(), "1228BL".to_string()],
                    },
                ),
                (
                    "kefar".to_string(),
                    DeviceModel {
                        display_name: "Kefar".to_string(),
                        numbers: vec!["H4W/H4B".to_string(), "C70".to_string()],
                    },
                ),
                (
                    "holyhah".to_string(),
                    DeviceModel {
                        display_name: "Holyhah".to_string(),
                        numbers: vec!["A60DZ/A66DZ".to_string(), "A30D/A3D".to_string()],
                    },
                ),
                (
                    "chiypos".to_string(),
                    DeviceModel {
                        display_name: "Chiypos".to_string(),
                        numbers: vec!["1680SW".to_string(), "1690SW".to_string()],
                    },
                ),
            ],
            common_questions: vec![
                (
                    "Инструкция".to_string(),
                    Solution::with_content("Инструкция на русском языке:", ContentKind::File),
                ),
                (
                    "Сброс настроек".to_string(),
                    Solution::with_content(
                        "Отсканируйте код(ы) для сброса настроек:",
                        ContentKind::Image,
                    ),
                ),
            ],
        };

        let printer = Device {
            display_name: "Принтер".to_string(),
            models: vec![
                (
                    "xprinter".to_string(),
                    DeviceModel {
                        display_name: "XPrinter".to_string(),
                        numbers: vec!["XP365B".to_string(), "XP422".to_string()],
                    },
                ),
                (
                    "niimbot".to_string(),
                    DeviceModel {
                        display_name: "NIIMBOT".to_string(),
                        numbers: vec!["B21".to_string(), "D11".to_string(), "D110".to_string()],
                    },
                ),
            ],
            common_questions: vec![(
                "Инструкция".to_string(),
                Solution::with_content("Инструкция на русском языке:", ContentKind::File),
            )],
        };

        let pager = Device {
            display_name: "Пейджеры".to_string(),
            models: vec![(
                "td".to_string(),
                DeviceModel {
                    display_name: "TD".to_string(),
                    numbers: vec!["TD175".to_string(), "TD157".to_string()],
                },
            )],
            common_questions: vec![(
                "Инструкция".to_string(),
                Solution::with_content("Инструкция на русском языке:", ContentKind::File),
            )],
        };

        let overrides = vec![
            (
                (
                    "scanner".to_string(),
                    "netum".to_string(),
                    "C750".to_string(),
                ),
                vec![
                    (
                        "Не включается".to_string(),
                        Solution::text(
                            "Возможно, он сильно разряжен, или вы его некорректно заряжали. \
                             Убедитесь, что мощность зарядки не более 5В-1А",
                        ),
                    ),
                    (
                        "Не сканирует".to_string(),
                        Solution::text("Проверьте, что кабель подключён, и перезапустите сканер"),
                    ),
                    (
                        "Установка драйвера".to_string(),
                        Solution::with_content(
                            "Скачайте и установите драйвер:",
                            ContentKind::File,
                        ),
                    ),
                ],
            ),
            (
                (
                    "scanner".to_string(),
                    "kefar".to_string(),
                    "H4W/H4B".to_string(),
                ),
                vec![(
                    "Греется".to_string(),
                    Solution::text("Дайте устройству остыть"),
                )],
            ),
        ];

        Self {
            devices: vec![
                ("scanner".to_string(), scanner),
                ("printer".to_string(), printer),
                ("pager".to_string(), pager),
            ],
            overrides,
        }
    }
}

// ============================================
// TOML representation
// ============================================

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    devices: Vec<RawDevice>,
    #[serde(default)]
    overrides: Vec<RawOverride>,
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    key: String,
    name: String,
    #[serde(default)]
    models: Vec<RawModel>,
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    key: String,
    name: String,
    #[serde(default)]
    numbers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    text: String,
    answer: String,
    #[serde(default)]
    content: ContentKind,
}

#[derive(Debug, Deserialize)]
struct RawOverride {
    device: String,
    model: String,
    number: String,
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

impl RawQuestion {
    fn into_entry(self) -> (String, Solution) {
        (
            self.text,
            Solution {
                text: self.answer,
                content_kind: self.content,
            },
        )
    }
}

impl RawCatalog {
    fn build(self) -> Result<DeviceCatalog> {
        let mut devices = Vec::with_capacity(self.devices.len());
        for raw in self.devices {
            if devices.iter().any(|(k, _)| *k == raw.key) {
                return Err(Error::Catalog(format!("duplicate device key: {}", raw.key)));
            }
            let device = Device {
                display_name: raw.name,
                models: raw
                    .models
                    .into_iter()
                    .map(|m| {
                        (
                            m.key,
                            DeviceModel {
                                display_name: m.name,
                                numbers: m.numbers,
                            },
                        )
                    })
                    .collect(),
                common_questions: raw.questions.into_iter().map(RawQuestion::into_entry).collect(),
            };
            devices.push((raw.key, device));
        }

        let mut overrides = Vec::with_capacity(self.overrides.len());
        for raw in self.overrides {
            let key = (raw.device, raw.model, raw.number);
            overrides.push((
                key,
                raw.questions
                    .into_iter()
                    .map(RawQuestion::into_entry)
                    .collect(),
            ));
        }

        Ok(DeviceCatalog { devices, overrides })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookups() {
        let catalog = DeviceCatalog::builtin();

        let scanner = catalog.device("scanner").unwrap();
        assert_eq!(scanner.display_name, "Сканер");
        assert_eq!(scanner.models.len(), 4);
        assert_eq!(scanner.model("netum").unwrap().numbers[0], "C750");

        assert!(catalog.device("toaster").is_none());
        assert!(scanner.model("bogus").is_none());
    }

    #[test]
    fn builtin_device_order_is_menu_order() {
        let catalog = DeviceCatalog::builtin();
        let keys: Vec<_> = catalog.devices().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["scanner", "printer", "pager"]);
    }

    #[test]
    fn overrides_keyed_by_full_path() {
        let catalog = DeviceCatalog::builtin();

        let qs = catalog.overrides_for("scanner", "netum", "C750").unwrap();
        assert_eq!(qs[0].0, "Не включается");

        // Numbers without an override block have none
        assert!(catalog.overrides_for("scanner", "netum", "1228BL").is_none());
    }

    #[test]
    fn parse_toml_catalog() {
        let toml = r#"
[[devices]]
key = "scanner"
name = "Сканер"

[[devices.models]]
key = "netum"
name = "Netum"
numbers = ["C750"]

[[devices.questions]]
text = "Инструкция"
answer = "Инструкция на русском языке:"
content = "file"

[[overrides]]
device = "scanner"
model = "netum"
number = "C750"

[[overrides.questions]]
text = "Не включается"
answer = "Проверьте зарядку"
"#;
        let catalog = DeviceCatalog::from_toml(toml).unwrap();
        let scanner = catalog.device("scanner").unwrap();
        assert_eq!(
            scanner.common_question("Инструкция").unwrap().content_kind,
            ContentKind::File
        );
        let qs = catalog.overrides_for("scanner", "netum", "C750").unwrap();
        assert_eq!(qs[0].1.text, "Проверьте зарядку");
    }

    #[test]
    fn duplicate_device_key_rejected() {
        let toml = r#"
[[devices]]
key = "scanner"
name = "A"

[[devices]]
key = "scanner"
name = "B"
"#;
        assert!(DeviceCatalog::from_toml(toml).is_err());
    }
}
