use serde::Deserialize;
use time::UtcOffset;

/// How to read ambiguous dates like `01/02/2021`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
    YearFirst,
}

/// Search options, normally loaded from the preferences of the host application.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Options {
    /// Drop records flagged as not active, for record types having an `active` flag.
    pub exclude_inactive: bool,
    pub date_order: DateOrder,
    /// Offset of the time zone calendar days are evaluated in, in minutes east of UTC.
    pub reference_offset_minutes: i16,
}

impl Options {
    pub fn reference_offset(&self) -> UtcOffset {
        let minutes = i32::from(self.reference_offset_minutes);
        UtcOffset::from_whole_seconds(minutes * 60).unwrap_or(UtcOffset::UTC)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let options: Options = serde_json::from_str("{}").unwrap();
        assert_eq!(options, Options::default());
        assert_eq!(options.reference_offset(), UtcOffset::UTC);
    }

    #[test]
    fn test_deserialize() {
        let options: Options = serde_json::from_str(
            r#"{"exclude-inactive": true, "date-order": "month-first", "reference-offset-minutes": -300}"#,
        )
        .unwrap();

        assert_eq!(
            options,
            Options {
                exclude_inactive: true,
                date_order: DateOrder::MonthFirst,
                reference_offset_minutes: -300,
            }
        );
        assert_eq!(
            options.reference_offset(),
            UtcOffset::from_hms(-5, 0, 0).unwrap()
        );
    }
}
