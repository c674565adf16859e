//! Outbound replies and user-facing texts

use crate::extract::ExtractionResult;
use crate::remote::{RemoteCommand, RemoteCommandResult};
use crate::session::Workflow;
use crate::store::RecordKind;

/// Token that confirms saving, compared case-insensitively
pub const AFFIRMATIVE: &str = "да";

/// Inline keyboards the bot can attach to a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// "All packages" / "Specific package"
    PackageChoice,
}

/// Transport-agnostic reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

pub fn greeting(full_name: &str) -> String {
    format!("Привет {}!", full_name)
}

pub fn help() -> String {
    "Команды:\n\
    /find_phone_number - найти телефонные номера в тексте\n\
    /find_email - найти email-адреса в тексте\n\
    /verify_password - проверить сложность пароля\n\
    /get_phone_numbers - номера телефонов из базы данных\n\
    /get_emails - email-адреса из базы данных\n\n\
    Удалённый хост:\n\
    /get_release - информация о релизе\n\
    /get_uname - архитектура, имя хоста, ядро\n\
    /get_uptime - время работы\n\
    /get_df - файловые системы\n\
    /get_free - оперативная память\n\
    /get_mpstat - производительность\n\
    /get_w - работающие пользователи\n\
    /get_auths - последние 10 входов\n\
    /get_critical - последние 5 критических событий\n\
    /get_ps - запущенные процессы\n\
    /get_ss - используемые порты\n\
    /get_apt_list - установленные пакеты\n\
    /get_services - запущенные сервисы\n\
    /get_repl_logs - логи репликации"
        .to_string()
}

/// Prompt sent by a workflow's entry command
pub fn entry_prompt(workflow: Workflow) -> Reply {
    match workflow {
        Workflow::FindPhoneNumbers => Reply::text("Введите текст для поиска телефонных номеров:"),
        Workflow::FindEmails => Reply::text("Введите текст для поиска email-адресов:"),
        Workflow::VerifyPassword => Reply::text("Введите текст для проверки пароля:"),
        Workflow::PackageLookup => Reply::with_keyboard("Выберите опцию:", Keyboard::PackageChoice),
    }
}

pub fn not_found(kind: RecordKind, long_digit_run: bool) -> String {
    match kind {
        RecordKind::Phone if long_digit_run => "Телефонные номера не найдены\n\
            (последовательности из 11 и более цифр подряд не считаются номерами)"
            .to_string(),
        RecordKind::Phone => "Телефонные номера не найдены".to_string(),
        RecordKind::Email => "Email-адреса не найдены".to_string(),
    }
}

pub fn confirm_prompt(result: &ExtractionResult) -> String {
    let header = match result.kind {
        RecordKind::Phone => "Найденные номера телефонов:",
        RecordKind::Email => "Найденные email-адреса:",
    };
    format!(
        "{}\n{}\nСохранить в базу данных? ({}/нет)",
        header,
        result.numbered(),
        AFFIRMATIVE
    )
}

pub fn saved(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Phone => "Номера телефонов успешно сохранены",
        RecordKind::Email => "Email-адреса успешно сохранены",
    }
}

pub fn save_failed(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Phone => "Ошибка при сохранении номеров телефонов",
        RecordKind::Email => "Ошибка при сохранении email-адресов",
    }
}

pub fn save_cancelled(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Phone => "Сохранение номеров телефонов отменено",
        RecordKind::Email => "Сохранение email-адресов отменено",
    }
}

pub fn password_verdict(strong: bool) -> &'static str {
    if strong {
        "Пароль сложный"
    } else {
        "Пароль простой"
    }
}

pub const ASK_PACKAGE_NAME: &str = "Введите название пакета:";

pub fn table_empty(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Phone => {
            "Не удалось получить номера телефонов из базы данных (Таблица пустая)."
        }
        RecordKind::Email => "Не удалось получить email-адреса из базы данных (Таблица пустая).",
    }
}

pub const STORE_READ_FAILED: &str = "Ошибка при чтении из базы данных";

pub const REMOTE_FAILED: &str = "Не удалось выполнить команду на удалённом хосте";

pub const REMOTE_NO_OUTPUT: &str = "Команда не вернула вывода";

/// Reply for a catalog command run from a stateless handler
pub fn remote_output(result: &RemoteCommandResult) -> String {
    if result.has_output() {
        result.display_output.clone()
    } else if result.succeeded {
        REMOTE_NO_OUTPUT.to_string()
    } else {
        REMOTE_FAILED.to_string()
    }
}

/// Reply for the package-lookup workflow's remote step
pub fn package_lookup_output(command: &RemoteCommand, result: &RemoteCommandResult) -> String {
    if result.has_output() {
        return result.display_output.clone();
    }
    match command {
        RemoteCommand::PackageInfo(name) if result.succeeded => {
            format!("Пакет '{}' не найден.", name)
        }
        RemoteCommand::InstalledPackages => {
            "Не удалось получить список установленных пакетов.".to_string()
        }
        _ => remote_output(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(output: &str, succeeded: bool) -> RemoteCommandResult {
        RemoteCommandResult {
            raw_output: output.to_string(),
            display_output: output.to_string(),
            succeeded,
        }
    }

    #[test]
    fn test_confirm_prompt_lists_items() {
        let r = ExtractionResult {
            kind: RecordKind::Phone,
            items: vec!["89991234567".into(), "89990001122".into()],
        };
        assert_eq!(
            confirm_prompt(&r),
            "Найденные номера телефонов:\n1. 89991234567\n2. 89990001122\nСохранить в базу данных? (да/нет)"
        );
    }

    #[test]
    fn test_remote_output_variants() {
        assert_eq!(remote_output(&result("up 3 days", true)), "up 3 days");
        assert_eq!(remote_output(&result("", true)), REMOTE_NO_OUTPUT);
        assert_eq!(remote_output(&result("", false)), REMOTE_FAILED);
    }

    #[test]
    fn test_package_lookup_fallbacks() {
        let info = RemoteCommand::PackageInfo("nosuchpkg".into());
        assert_eq!(
            package_lookup_output(&info, &result("", true)),
            "Пакет 'nosuchpkg' не найден."
        );
        assert_eq!(package_lookup_output(&info, &result("", false)), REMOTE_FAILED);
        assert_eq!(
            package_lookup_output(&RemoteCommand::InstalledPackages, &result("", false)),
            "Не удалось получить список установленных пакетов."
        );
        assert_eq!(
            package_lookup_output(&info, &result("Package: curl", true)),
            "Package: curl"
        );
    }

    #[test]
    fn test_entry_prompt_keyboard_only_for_packages() {
        assert_eq!(
            entry_prompt(Workflow::PackageLookup).keyboard,
            Some(Keyboard::PackageChoice)
        );
        assert!(entry_prompt(Workflow::FindEmails).keyboard.is_none());
    }
}
