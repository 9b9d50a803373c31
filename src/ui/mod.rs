//! # UI Module
//!
//! Panels the bot posts to text channels: now playing, queue, search results,
//! idle notice and plain messages.
//!
//! Builders in [`embeds`] and [`buttons`] produce a transport-neutral [`Panel`]
//! that the orchestrator can compare in tests; [`Panel::embeds`] and
//! [`Panel::components`] turn it into serenity builders right before sending.

use serenity::{
    all::{ButtonStyle, Colour},
    builder::{CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

pub mod buttons;
pub mod embeds;

/// Mensaje renderizable: texto, un embed opcional y filas de botones
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Panel {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub rows: Vec<Vec<Button>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub colour: Colour,
    pub thumbnail: Option<String>,
    pub fields: Vec<(String, String, bool)>,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
    pub disabled: bool,
}

impl Panel {
    /// Panel de sólo texto
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Self::default()
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Button>>) -> Self {
        self.rows = rows;
        self
    }

    pub fn without_rows(mut self) -> Self {
        self.rows.clear();
        self
    }

    pub fn embeds(&self) -> Vec<CreateEmbed> {
        self.embed.iter().map(Embed::build).collect()
    }

    pub fn components(&self) -> Vec<CreateActionRow> {
        self.rows
            .iter()
            .filter(|row| !row.is_empty())
            .map(|row| CreateActionRow::Buttons(row.iter().map(Button::build).collect()))
            .collect()
    }
}

impl Embed {
    pub fn new(title: impl Into<String>, colour: Colour) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            url: None,
            colour,
            thumbnail: None,
            fields: Vec::new(),
            footer: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push((name.into(), value.into(), inline));
        self
    }

    pub fn thumbnail(mut self, url: Option<String>) -> Self {
        self.thumbnail = url.filter(|u| !u.is_empty());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    fn build(&self) -> CreateEmbed {
        let mut embed = CreateEmbed::default()
            .title(&self.title)
            .color(self.colour);

        if !self.description.is_empty() {
            embed = embed.description(&self.description);
        }
        if let Some(url) = &self.url {
            embed = embed.url(url);
        }
        if let Some(thumbnail) = &self.thumbnail {
            embed = embed.thumbnail(thumbnail);
        }
        for (name, value, inline) in &self.fields {
            embed = embed.field(name, value, *inline);
        }
        if let Some(footer) = &self.footer {
            embed = embed.footer(CreateEmbedFooter::new(footer));
        }

        embed
    }
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            style,
            disabled: false,
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    fn build(&self) -> CreateButton {
        CreateButton::new(&self.custom_id)
            .label(&self.label)
            .style(self.style)
            .disabled(self.disabled)
    }
}

/// Formatea duración como h:mm:ss o m:ss
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Barra de progreso de `width` segmentos con el cursor en la posición actual
pub fn progress_bar(position: Duration, total: Duration, width: usize) -> String {
    if total.is_zero() {
        return String::new();
    }

    let ratio = position.as_secs_f64() / total.as_secs_f64();
    let filled = ((ratio * width as f64) as usize).min(width);

    (0..width)
        .map(|i| match i.cmp(&filled) {
            std::cmp::Ordering::Less => '▬',
            std::cmp::Ordering::Equal => '●',
            std::cmp::Ordering::Greater => '━',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(212)), "3:32");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn test_progress_bar() {
        let total = Duration::from_secs(100);

        assert_eq!(progress_bar(Duration::ZERO, total, 4), "●━━━");
        assert_eq!(progress_bar(Duration::from_secs(50), total, 4), "▬▬●━");
        assert_eq!(progress_bar(Duration::from_secs(500), total, 4), "▬▬▬▬");
        assert_eq!(progress_bar(Duration::from_secs(10), Duration::ZERO, 4), "");
    }

    #[test]
    fn test_empty_rows_are_not_rendered() {
        let panel = Panel::text("hola").with_rows(vec![vec![]]);

        assert!(panel.components().is_empty());
        assert!(panel.embeds().is_empty());
    }
}
