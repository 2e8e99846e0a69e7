//! Interaction controller
//!
//! Receives `(user, callback_payload)` events from the chat transport,
//! dispatches to the navigator/token registry/content resolver, records the
//! transition in the statistics store, and returns a [`Render`] instruction.
//!
//! Failures here are per-request: "not found" conditions become user-facing
//! notices, and a failing statistics write is logged without breaking the
//! reply. Nothing in this module is fatal to the event loop.

use crate::catalog::DeviceCatalog;
use crate::config::AdminConfig;
use crate::content::ContentResolver;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::navigator::{menu_rows, single_column_rows, Navigator};
use crate::report;
use crate::token::TokenRegistry;
use crate::types::{ActionType, MenuButton, Render, UserInfo};

/// Button labels are capped to the transport's limit.
const MAX_LABEL_CHARS: usize = 64;

const BACK_LABEL: &str = "« Назад";
const NOT_FOUND_TEXT: &str = "Решение не найдено";

const START_TEXT: &str = "Доброго времени суток!\n\n\
    Выберите тип устройства, с которым возникли проблемы:";
const MODEL_TEXT: &str = "Теперь выберите модель устройства, она указана на коробке \
    или маркетплейсе, где был приобретён товар.\n\
    Следующим шагом нужно будет выбрать номер.\n\n\
    Пример: модель - Netum, номер - C750";
const NUMBER_TEXT: &str = "Осталось выбрать номер устройства.\n\n\
    Пример: модель - Xprinter, номер - XP365B";
const QUESTIONS_TEXT: &str = "Выберите проблему, с которой вы столкнулись.";
const OTHER_TEXT: &str = "Пожалуйста, опишите вашу проблему нашему специалисту поддержки.";
const CONTENT_UNAVAILABLE_TEXT: &str = "⚠ Контент недоступен";

// ============================================
// Callback payload encoding
// ============================================

/// Parsed form of a callback payload: underscore-joined segments whose
/// first segment is the action tag. Serial numbers are assumed free of the
/// separator; question payloads carry a minted token id, never raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Start,
    Other,
    Device(String),
    Model(String, String),
    Number(String, String, String),
    Question(String),
    BackToStart,
    BackToModels(String),
    BackToNumbers(String, String),
    BackToQuestions(String, String, String),
}

impl CallbackAction {
    /// Parse a raw callback payload.
    pub fn parse(payload: &str) -> Result<Self> {
        let malformed = || Error::Payload(payload.to_string());

        if payload == "start" {
            return Ok(CallbackAction::Start);
        }
        if payload == "other" {
            return Ok(CallbackAction::Other);
        }

        if let Some(rest) = payload.strip_prefix("back_to_") {
            if rest == "start" {
                return Ok(CallbackAction::BackToStart);
            }
            if let Some(device) = rest.strip_prefix("models_") {
                return Ok(CallbackAction::BackToModels(device.to_string()));
            }
            if let Some(path) = rest.strip_prefix("numbers_") {
                let (device, model) = path.split_once('_').ok_or_else(malformed)?;
                return Ok(CallbackAction::BackToNumbers(
                    device.to_string(),
                    model.to_string(),
                ));
            }
            if let Some(path) = rest.strip_prefix("questions_") {
                let mut parts = path.splitn(3, '_');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(device), Some(model), Some(number)) => {
                        return Ok(CallbackAction::BackToQuestions(
                            device.to_string(),
                            model.to_string(),
                            number.to_string(),
                        ));
                    }
                    _ => return Err(malformed()),
                }
            }
            return Err(malformed());
        }

        if let Some(device) = payload.strip_prefix("device_") {
            if device.is_empty() {
                return Err(malformed());
            }
            return Ok(CallbackAction::Device(device.to_string()));
        }
        if let Some(path) = payload.strip_prefix("model_") {
            let (device, model) = path.split_once('_').ok_or_else(malformed)?;
            if model.is_empty() {
                return Err(malformed());
            }
            return Ok(CallbackAction::Model(device.to_string(), model.to_string()));
        }
        if let Some(path) = payload.strip_prefix("number_") {
            let mut parts = path.splitn(3, '_');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(device), Some(model), Some(number)) if !number.is_empty() => {
                    return Ok(CallbackAction::Number(
                        device.to_string(),
                        model.to_string(),
                        number.to_string(),
                    ));
                }
                _ => return Err(malformed()),
            }
        }
        if let Some(token) = payload.strip_prefix("question_") {
            if token.is_empty() {
                return Err(malformed());
            }
            return Ok(CallbackAction::Question(token.to_string()));
        }

        Err(malformed())
    }
}

/// Commands delivered by the transport alongside callback events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stats,
    MyStats,
    WeekStats,
    MonthStats,
}

impl std::str::FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim_start_matches('/') {
            "start" => Ok(Command::Start),
            "stats" => Ok(Command::Stats),
            "mystats" => Ok(Command::MyStats),
            "weekstats" => Ok(Command::WeekStats),
            "monthstats" => Ok(Command::MonthStats),
            other => Err(format!("unknown command: {}", other)),
        }
    }
}

// ============================================
// Controller
// ============================================

/// Drives the navigator, token registry, content resolver, and statistics
/// store for one process. Owns the registry, so its lifetime bounds token
/// validity.
pub struct Controller {
    catalog: DeviceCatalog,
    registry: TokenRegistry,
    content: ContentResolver,
    db: Database,
    admin: AdminConfig,
}

impl Controller {
    pub fn new(
        catalog: DeviceCatalog,
        content: ContentResolver,
        db: Database,
        admin: AdminConfig,
    ) -> Self {
        Self {
            catalog,
            registry: TokenRegistry::new(),
            content,
            db,
            admin,
        }
    }

    /// The statistics store, shared with the reporting surface.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Handle one callback event. Recoverable "not found" conditions come
    /// back as notices; only payload corruption and store failures during
    /// rendering surface as errors.
    pub fn handle_event(&self, user: &UserInfo, payload: &str) -> Result<Render> {
        if let Err(e) = self.db.record_user(user) {
            tracing::warn!(user_id = user.id, error = %e, "profile upsert failed");
        }

        let action = CallbackAction::parse(payload)?;
        tracing::debug!(user_id = user.id, ?action, "callback event");

        let result = self.dispatch(user, &action);
        match result {
            Err(e) if e.is_not_found() => {
                tracing::info!(user_id = user.id, error = %e, "not found, notifying user");
                Ok(Render::notice(NOT_FOUND_TEXT))
            }
            other => other,
        }
    }

    fn dispatch(&self, user: &UserInfo, action: &CallbackAction) -> Result<Render> {
        match action {
            CallbackAction::Start | CallbackAction::BackToStart => {
                self.log_action(user.id, ActionType::Start, &[None, None, None, None]);
                Ok(self.start_menu())
            }
            CallbackAction::Other => {
                self.log_action(user.id, ActionType::OtherSelected, &[None, None, None, None]);
                Ok(Render::notice(OTHER_TEXT))
            }
            CallbackAction::Device(device) | CallbackAction::BackToModels(device) => {
                let render = self.models_menu(device)?;
                self.log_action(
                    user.id,
                    ActionType::DeviceSelected,
                    &[Some(device), None, None, None],
                );
                Ok(render)
            }
            CallbackAction::Model(device, model)
            | CallbackAction::BackToNumbers(device, model) => {
                let render = self.numbers_menu(device, model)?;
                self.log_action(
                    user.id,
                    ActionType::ModelSelected,
                    &[Some(device), Some(model), None, None],
                );
                Ok(render)
            }
            CallbackAction::Number(device, model, number)
            | CallbackAction::BackToQuestions(device, model, number) => {
                let render = self.questions_menu(device, model, number)?;
                self.log_action(
                    user.id,
                    ActionType::NumberSelected,
                    &[Some(device), Some(model), Some(number), None],
                );
                Ok(render)
            }
            CallbackAction::Question(token) => self.deliver_solution(user, token),
        }
    }

    /// Handle one command event from the transport.
    pub fn handle_command(&self, user: &UserInfo, command: Command) -> Result<Render> {
        if let Err(e) = self.db.record_user(user) {
            tracing::warn!(user_id = user.id, error = %e, "profile upsert failed");
        }

        match command {
            Command::Start => {
                self.log_action(user.id, ActionType::Start, &[None, None, None, None]);
                Ok(self.start_menu())
            }
            Command::Stats => self.admin_gated(user, |db| {
                let daily = db.daily_stats(chrono::Utc::now().date_naive())?;
                let weekly = db.weekly_stats()?;

                let mut text = report::format_daily(&daily);
                text.push_str("\n\n📈 Статистика за неделю:\n");
                text.push_str(&format!(
                    "• Уникальных пользователей: {}\n",
                    weekly.unique_users
                ));
                text.push_str(&format!("• Всего действий: {}", weekly.total_actions));
                Ok(Render::notice(text))
            }),
            Command::MyStats => self.admin_gated(user, |db| match db.user_stats(user.id) {
                Ok(stats) => Ok(Render::notice(report::format_user(&stats))),
                Err(Error::UserNotFound(_)) => {
                    Ok(Render::notice("Статистика пользователя не найдена"))
                }
                Err(e) => Err(e),
            }),
            Command::WeekStats => self.admin_gated(user, |db| {
                let stats = db.weekly_stats()?;
                Ok(Render::notice(report::format_period("неделю", &stats)))
            }),
            Command::MonthStats => self.admin_gated(user, |db| {
                let stats = db.monthly_stats()?;
                Ok(Render::notice(report::format_period("месяц", &stats)))
            }),
        }
    }

    /// Run an admin-only query, or reject with a message naming the caller.
    /// Rejections never include any statistics.
    fn admin_gated<F>(&self, user: &UserInfo, query: F) -> Result<Render>
    where
        F: FnOnce(&Database) -> Result<Render>,
    {
        match self.require_admin(user) {
            Ok(()) => query(&self.db),
            Err(Error::Unauthorized(id)) => {
                tracing::info!(user_id = id, "admin command rejected");
                Ok(Render::notice(format!(
                    "❌ У вас нет прав для просмотра статистики\nВаш ID: {}",
                    id
                )))
            }
            Err(e) => Err(e),
        }
    }

    fn require_admin(&self, user: &UserInfo) -> Result<()> {
        if self.admin.is_admin(user.id) {
            Ok(())
        } else {
            Err(Error::Unauthorized(user.id))
        }
    }

    // ============================================
    // Menu rendering
    // ============================================

    fn start_menu(&self) -> Render {
        let nav = Navigator::new(&self.catalog);
        let mut buttons: Vec<MenuButton> = nav
            .list_devices()
            .into_iter()
            .map(|(key, name)| MenuButton::new(name, format!("device_{}", key)))
            .collect();
        buttons.push(MenuButton::new("Другое", "other"));

        // The start menu has no back row, just the two-per-row grid
        let rows = buttons.chunks(2).map(|pair| pair.to_vec()).collect();
        Render::Menu {
            text: START_TEXT.to_string(),
            rows,
        }
    }

    fn models_menu(&self, device: &str) -> Result<Render> {
        let nav = Navigator::new(&self.catalog);
        let models = nav.list_models(device)?;
        let device_name = self.device_name(device)?;

        let buttons = models
            .into_iter()
            .map(|(key, name)| MenuButton::new(name, format!("model_{}_{}", device, key)))
            .collect();

        Ok(Render::Menu {
            text: format!("{}. {}", device_name, MODEL_TEXT),
            rows: menu_rows(buttons, MenuButton::new(BACK_LABEL, "back_to_start")),
        })
    }

    fn numbers_menu(&self, device: &str, model: &str) -> Result<Render> {
        let nav = Navigator::new(&self.catalog);
        let numbers = nav.list_numbers(device, model)?;
        let device_name = self.device_name(device)?;
        let model_name = self.model_name(device, model)?;

        let buttons = numbers
            .into_iter()
            .map(|number| {
                MenuButton::new(number, format!("number_{}_{}_{}", device, model, number))
            })
            .collect();

        Ok(Render::Menu {
            text: format!("{} {}. {}", device_name, model_name, NUMBER_TEXT),
            rows: single_column_rows(
                buttons,
                MenuButton::new(BACK_LABEL, format!("back_to_models_{}", device)),
            ),
        })
    }

    fn questions_menu(&self, device: &str, model: &str, number: &str) -> Result<Render> {
        let nav = Navigator::new(&self.catalog);
        let questions = nav.list_questions(device, model, number)?;
        let device_name = self.device_name(device)?;
        let model_name = self.model_name(device, model)?;

        // Every render re-mints tokens, so a menu always resolves even after
        // earlier tokens were consumed or lost to a restart.
        let buttons = questions
            .into_iter()
            .map(|question| {
                let token = self.registry.mint(device, model, number, question);
                MenuButton::new(truncate_label(question), format!("question_{}", token))
            })
            .collect();

        Ok(Render::Menu {
            text: format!(
                "{} {} {}. {}",
                device_name, model_name, number, QUESTIONS_TEXT
            ),
            rows: menu_rows(
                buttons,
                MenuButton::new(
                    BACK_LABEL,
                    format!("back_to_numbers_{}_{}", device, model),
                ),
            ),
        })
    }

    fn deliver_solution(&self, user: &UserInfo, token: &str) -> Result<Render> {
        let payload = self.registry.resolve(token)?;
        let nav = Navigator::new(&self.catalog);
        let solution = nav.resolve_solution(
            &payload.device,
            &payload.model,
            &payload.number,
            &payload.question,
        )?;

        self.log_action(
            user.id,
            ActionType::QuestionSelected,
            &[
                Some(&payload.device),
                Some(&payload.model),
                Some(&payload.number),
                Some(&payload.question),
            ],
        );

        let path = self.content.resolve(
            &payload.device,
            &payload.model,
            &payload.number,
            &payload.question,
            solution.content_kind,
        );

        let mut caption = solution.text.clone();
        if let Some(path) = &path {
            if !self.content.exists(path) {
                caption.push_str(&format!(
                    "\n\n{}\nПуть: {}",
                    CONTENT_UNAVAILABLE_TEXT,
                    path.display()
                ));
            }
        }

        let back = MenuButton::new(
            BACK_LABEL,
            format!(
                "back_to_questions_{}_{}_{}",
                payload.device, payload.model, payload.number
            ),
        );

        Ok(Render::Content {
            caption,
            kind: solution.content_kind,
            path,
            rows: vec![vec![back]],
        })
    }

    fn device_name(&self, device: &str) -> Result<&str> {
        self.catalog
            .device(device)
            .map(|d| d.display_name.as_str())
            .ok_or_else(|| Error::DeviceNotFound(device.to_string()))
    }

    fn model_name(&self, device: &str, model: &str) -> Result<&str> {
        self.catalog
            .device(device)
            .and_then(|d| d.model(model))
            .map(|m| m.display_name.as_str())
            .ok_or_else(|| Error::ModelNotFound(format!("{}/{}", device, model)))
    }

    /// Best-effort statistics write; a store failure is logged and never
    /// breaks the reply.
    fn log_action(&self, user_id: i64, action: ActionType, fields: &[Option<&str>; 4]) {
        let [device, model, number, question] = *fields;
        if let Err(e) = self
            .db
            .record_action(user_id, action, device, model, number, question)
        {
            tracing::error!(user_id, action = %action, error = %e, "action log write failed");
        }
    }
}

fn truncate_label(text: &str) -> String {
    text.chars().take(MAX_LABEL_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DeviceCatalog;
    use crate::types::ContentKind;

    fn controller(admin_ids: Vec<i64>) -> Controller {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        Controller::new(
            DeviceCatalog::builtin(),
            ContentResolver::new("data"),
            db,
            AdminConfig {
                admin_ids,
                admin_chat_id: None,
            },
        )
    }

    fn user() -> UserInfo {
        UserInfo {
            id: 100,
            username: Some("alice".to_string()),
            first_name: Some("Алиса".to_string()),
            last_name: None,
        }
    }

    // ============================================
    // Payload parsing
    // ============================================

    #[test]
    fn parse_every_tag() {
        assert_eq!(CallbackAction::parse("start").unwrap(), CallbackAction::Start);
        assert_eq!(CallbackAction::parse("other").unwrap(), CallbackAction::Other);
        assert_eq!(
            CallbackAction::parse("device_scanner").unwrap(),
            CallbackAction::Device("scanner".into())
        );
        assert_eq!(
            CallbackAction::parse("model_scanner_netum").unwrap(),
            CallbackAction::Model("scanner".into(), "netum".into())
        );
        assert_eq!(
            CallbackAction::parse("number_scanner_netum_C750").unwrap(),
            CallbackAction::Number("scanner".into(), "netum".into(), "C750".into())
        );
        assert_eq!(
            CallbackAction::parse("question_scanner_netum_C750_ab12cd34").unwrap(),
            CallbackAction::Question("scanner_netum_C750_ab12cd34".into())
        );
        assert_eq!(
            CallbackAction::parse("back_to_start").unwrap(),
            CallbackAction::BackToStart
        );
        assert_eq!(
            CallbackAction::parse("back_to_models_scanner").unwrap(),
            CallbackAction::BackToModels("scanner".into())
        );
        assert_eq!(
            CallbackAction::parse("back_to_numbers_scanner_netum").unwrap(),
            CallbackAction::BackToNumbers("scanner".into(), "netum".into())
        );
        assert_eq!(
            CallbackAction::parse("back_to_questions_scanner_netum_C750").unwrap(),
            CallbackAction::BackToQuestions("scanner".into(), "netum".into(), "C750".into())
        );
    }

    #[test]
    fn parse_rejects_malformed_payloads() {
        for payload in ["", "bogus", "device_", "model_scanner", "back_to_galaxy", "number_a_b"] {
            assert!(
                matches!(CallbackAction::parse(payload), Err(Error::Payload(_))),
                "payload {:?} should be rejected",
                payload
            );
        }
    }

    // ============================================
    // Menu flow
    // ============================================

    #[test]
    fn start_menu_groups_devices_and_other() {
        let ctl = controller(vec![]);
        let render = ctl.handle_event(&user(), "start").unwrap();
        let Render::Menu { rows, .. } = render else {
            panic!("expected menu");
        };
        // scanner/printer, pager/other
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].callback, "device_scanner");
        assert_eq!(rows[1][1].callback, "other");
    }

    #[test]
    fn models_menu_has_back_to_start() {
        let ctl = controller(vec![]);
        let render = ctl.handle_event(&user(), "device_scanner").unwrap();
        let Render::Menu { rows, .. } = render else {
            panic!("expected menu");
        };
        // 4 models → 2 rows of 2, plus back row
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2][0].callback, "back_to_start");
    }

    #[test]
    fn questions_menu_mints_tokens() {
        let ctl = controller(vec![]);
        let render = ctl
            .handle_event(&user(), "number_scanner_netum_C750")
            .unwrap();
        let Render::Menu { rows, .. } = render else {
            panic!("expected menu");
        };
        // 5 questions → 2+2+1 rows, plus back row
        assert_eq!(rows.len(), 4);
        assert!(rows[0][0].callback.starts_with("question_scanner_netum_C750_"));
        assert_eq!(rows[3][0].callback, "back_to_numbers_scanner_netum");
    }

    #[test]
    fn unknown_device_renders_not_found_notice() {
        let ctl = controller(vec![]);
        let render = ctl.handle_event(&user(), "device_toaster").unwrap();
        assert_eq!(render, Render::notice(NOT_FOUND_TEXT));
    }

    #[test]
    fn full_question_flow_resolves_once() {
        let ctl = controller(vec![]);

        let render = ctl
            .handle_event(&user(), "number_scanner_netum_C750")
            .unwrap();
        let Render::Menu { rows, .. } = render else {
            panic!("expected menu");
        };
        let question_callback = rows[0][0].callback.clone();

        // First resolution delivers the authored solution text
        let render = ctl.handle_event(&user(), &question_callback).unwrap();
        let Render::Content { caption, kind, path, .. } = render else {
            panic!("expected content");
        };
        assert!(caption.starts_with("Возможно, он сильно разряжен"));
        assert_eq!(kind, ContentKind::None);
        assert!(path.is_none());

        // Replaying the consumed token is "not found"
        let render = ctl.handle_event(&user(), &question_callback).unwrap();
        assert_eq!(render, Render::notice(NOT_FOUND_TEXT));

        // Re-rendering the menu mints fresh tokens that work again
        let render = ctl
            .handle_event(&user(), "back_to_questions_scanner_netum_C750")
            .unwrap();
        let Render::Menu { rows, .. } = render else {
            panic!("expected menu");
        };
        assert!(ctl.handle_event(&user(), &rows[0][0].callback).is_ok());
    }

    #[test]
    fn missing_content_appends_unavailable_notice() {
        let ctl = controller(vec![]);
        let render = ctl
            .handle_event(&user(), "number_scanner_netum_1228BL")
            .unwrap();
        let Render::Menu { rows, .. } = render else {
            panic!("expected menu");
        };
        // First question is "Инструкция", a file-backed solution
        let render = ctl.handle_event(&user(), &rows[0][0].callback).unwrap();
        let Render::Content { caption, kind, path, .. } = render else {
            panic!("expected content");
        };
        assert_eq!(kind, ContentKind::File);
        assert!(path.is_some());
        assert!(caption.contains(CONTENT_UNAVAILABLE_TEXT));
    }

    #[test]
    fn events_are_recorded_in_the_action_log() {
        let ctl = controller(vec![]);
        ctl.handle_event(&user(), "start").unwrap();
        ctl.handle_event(&user(), "device_scanner").unwrap();
        ctl.handle_event(&user(), "model_scanner_netum").unwrap();
        ctl.handle_event(&user(), "number_scanner_netum_C750").unwrap();

        let stats = ctl.db().user_stats(100).unwrap();
        assert_eq!(stats.total_actions, 4);
        assert_eq!(stats.recent_actions[0].action_type, ActionType::NumberSelected);
        assert_eq!(stats.device_stats[0].0, "C750");
    }

    // ============================================
    // Admin surface
    // ============================================

    #[test]
    fn admin_commands_rejected_for_non_admins() {
        let ctl = controller(vec![1]);
        let render = ctl.handle_command(&user(), Command::Stats).unwrap();
        let Render::Notice { text } = render else {
            panic!("expected notice");
        };
        assert!(text.contains("Ваш ID: 100"));
        // Rejection never leaks statistics
        assert!(!text.contains("Всего действий"));
    }

    #[test]
    fn admin_commands_allowed_for_admins() {
        let ctl = controller(vec![100]);
        ctl.handle_event(&user(), "start").unwrap();

        let render = ctl.handle_command(&user(), Command::Stats).unwrap();
        let Render::Notice { text } = render else {
            panic!("expected notice");
        };
        assert!(text.contains("Статистика бота"));
        assert!(text.contains("Статистика за неделю"));

        let render = ctl.handle_command(&user(), Command::MyStats).unwrap();
        let Render::Notice { text } = render else {
            panic!("expected notice");
        };
        assert!(text.contains("Статистика пользователя"));
    }

    #[test]
    fn start_command_matches_start_callback() {
        let ctl = controller(vec![]);
        let from_command = ctl.handle_command(&user(), Command::Start).unwrap();
        let from_callback = ctl.handle_event(&user(), "start").unwrap();
        assert_eq!(from_command, from_callback);
    }
}
