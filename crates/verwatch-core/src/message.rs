/// Placeholders: `{plugin}`, `{current_version}`, `{latest_version}`, `{resource_url}`.
pub const DEFAULT_UPDATE_TEMPLATE: &str = "[{plugin}] The plugin has an update available, from {current_version} to {latest_version}, download address: {resource_url}";
pub const DEFAULT_NO_UPDATE_TEMPLATE: &str =
    "[{plugin}] Already the latest version (or because of cache)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplates {
    pub update: String,
    pub no_update: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            update: DEFAULT_UPDATE_TEMPLATE.to_string(),
            no_update: DEFAULT_NO_UPDATE_TEMPLATE.to_string(),
        }
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct MessageContext<'a> {
    pub plugin: &'a str,
    pub current_version: &'a str,
    /// Absent before the first successful fetch; rendered as an empty string.
    pub latest_version: Option<&'a str>,
    pub resource_url: &'a str,
}

#[must_use]
pub fn render_template(template: &str, context: &MessageContext<'_>) -> String {
    template
        .replace("{plugin}", context.plugin)
        .replace("{current_version}", context.current_version)
        .replace("{latest_version}", context.latest_version.unwrap_or_default())
        .replace("{resource_url}", context.resource_url)
}

/// Where rendered update messages end up, e.g. a console or chat broadcaster.
pub trait NotificationSink: Send + Sync {
    fn notify_update(&self, message: &str);

    fn notify_up_to_date(&self, message: &str);
}

#[cfg(test)]
mod tests {
    use super::{MessageContext, MessageTemplates, render_template};

    fn context(latest_version: Option<&str>) -> MessageContext<'_> {
        MessageContext {
            plugin: "ViaVersion",
            current_version: "5.2.1",
            latest_version,
            resource_url: "https://modrinth.com/project/viaversion",
        }
    }

    #[test]
    fn update_template_fills_every_placeholder() {
        let templates = MessageTemplates::default();

        assert_eq!(
            render_template(&templates.update, &context(Some("5.3.0"))),
            "[ViaVersion] The plugin has an update available, from 5.2.1 to 5.3.0, download address: https://modrinth.com/project/viaversion"
        );
    }

    #[test]
    fn absent_latest_version_renders_empty() {
        let message = render_template("{current_version} -> [{latest_version}]", &context(None));

        assert_eq!(message, "5.2.1 -> []");
    }

    #[test]
    fn no_update_template_only_names_the_plugin() {
        let templates = MessageTemplates::default();

        assert_eq!(
            render_template(&templates.no_update, &context(Some("5.3.0"))),
            "[ViaVersion] Already the latest version (or because of cache)"
        );
    }
}
