use crate::config::CallboxConfig;
use crate::twiml::{TwimlError, Verb};

/// DTMF clip played over the call to drive the building's gate hardware.
const BUZZER_URL_BASE: &str = "http://www.dialabc.com/i/cache/dtmfgen/wavpcm8.300/";

/// Which step of the call flow a webhook hit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Menu,
    Gather,
    Secret,
}

impl Page {
    /// Anything other than the two follow-up pages falls back to the menu.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("gather") => Page::Gather,
            Some("secret") => Page::Secret,
            _ => Page::Menu,
        }
    }
}

/// Build the TwiML response for one webhook hit.
///
/// `self_url` is the path Twilio hit for this request; it is echoed back in
/// Gather actions and Redirects so each step points at the next. Bad caller
/// input is never an error here — every branch that matches nothing ends in
/// a redirect back to the menu.
pub fn build(
    config: &CallboxConfig,
    page: Page,
    digits: Option<&str>,
    self_url: &str,
) -> Result<Verb, TwimlError> {
    let mut resp = Verb::response();
    let voice: &[(&str, &str)] = &[("voice", config.voice.as_str())];

    match page {
        Page::Menu => {
            resp.pause(&[("length", "2")])?;
            let action = format!("{self_url}?page=gather");
            let gather = resp.gather(&[
                ("action", &action),
                ("numDigits", "1"),
                ("method", "POST"),
            ])?;
            gather.pause(&[("length", "1")])?;
            gather.say(&config.greeting, voice)?;
            for (i, roommate) in config.roommates.iter().enumerate() {
                gather.pause(&[("length", "1")])?;
                gather.say(&format!("For {}, press {}.", roommate.name, i + 1), voice)?;
            }
        }
        Page::Gather => {
            let digits = digits.unwrap_or("");
            if let (Some(secret), "9") = (&config.secret, digits) {
                // Digit 9 always opens the secret prompt, even if a ninth
                // roommate happens to be configured at that position.
                let action = format!("{self_url}?page=secret");
                let num_digits = secret.len().to_string();
                let gather = resp.gather(&[
                    ("action", &action),
                    ("numDigits", &num_digits),
                    ("method", "POST"),
                ])?;
                gather.say("Please enter the secret code now.", voice)?;
            } else if let Some(roommate) = digits
                .parse::<usize>()
                .ok()
                .and_then(|d| d.checked_sub(1))
                .and_then(|i| config.roommates.get(i))
            {
                resp.say(&format!("Connecting you to {}", roommate.name), voice)?;
                resp.dial(&roommate.number, &[])?;
            }
            resp.redirect(self_url, &[])?;
        }
        Page::Secret => {
            if let (Some(secret), Some(digits)) = (&config.secret, digits) {
                // Straight string comparison: leading zeros and non-numeric
                // secrets stay legal.
                if digits == secret {
                    resp.say("Buzzing you in now.", voice)?;
                    resp.play(&format!("{BUZZER_URL_BASE}{}.wav", config.gate_code), &[])?;
                }
            }
            resp.redirect(self_url, &[])?;
        }
    }

    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Roommate, Voice};

    fn test_config(secret: Option<&str>, roommate_count: usize) -> CallboxConfig {
        let names = [
            "Ryan", "Mary", "Alex", "Sam", "Pat", "Lee", "Kim", "Jo", "Max",
        ];
        CallboxConfig {
            greeting: "This is the apartment callbox.".to_string(),
            gate_code: "7".to_string(),
            roommates: names
                .iter()
                .take(roommate_count)
                .map(|name| Roommate {
                    name: (*name).to_string(),
                    number: "415-555-5555".to_string(),
                })
                .collect(),
            secret: secret.map(str::to_string),
            voice: Voice::Woman,
        }
    }

    fn rendered(config: &CallboxConfig, page: Page, digits: Option<&str>) -> String {
        build(config, page, digits, "/voice").unwrap().render()
    }

    const REDIRECT_ONLY: &str =
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response><Redirect>/voice</Redirect></Response>";

    #[test]
    fn menu_opens_with_pause_then_gather() {
        let xml = rendered(&test_config(Some("1234"), 2), Page::Menu, None);
        let pause = xml.find(r#"<Pause length="2"/>"#).expect("opening pause");
        let gather = xml
            .find(r#"<Gather action="/voice?page=gather" numDigits="1" method="POST">"#)
            .expect("menu gather");
        assert!(pause < gather, "pause should precede the gather: {xml}");
    }

    #[test]
    fn menu_lists_roommates_in_keypad_order() {
        let xml = rendered(&test_config(Some("1234"), 2), Page::Menu, None);
        let greeting = xml.find("This is the apartment callbox.").unwrap();
        let ryan = xml.find("For Ryan, press 1.").unwrap();
        let mary = xml.find("For Mary, press 2.").unwrap();
        assert!(greeting < ryan && ryan < mary, "menu out of order: {xml}");
    }

    #[test]
    fn menu_says_use_configured_voice() {
        let config = CallboxConfig {
            voice: Voice::Man,
            ..test_config(None, 1)
        };
        let xml = rendered(&config, Page::Menu, None);
        assert!(xml.contains(r#"<Say voice="man">"#));
        assert!(!xml.contains(r#"voice="woman""#));
    }

    #[test]
    fn gather_digit_connects_roommate() {
        let xml = rendered(&test_config(Some("1234"), 2), Page::Gather, Some("1"));
        let say = xml
            .find(r#"<Say voice="woman">Connecting you to Ryan</Say>"#)
            .expect("connect announcement");
        let dial = xml.find("<Dial>415-555-5555</Dial>").expect("dial");
        let redirect = xml.find("<Redirect>/voice</Redirect>").expect("redirect");
        assert!(say < dial && dial < redirect, "{xml}");
    }

    #[test]
    fn gather_digit_nine_prompts_for_secret() {
        let xml = rendered(&test_config(Some("1234"), 2), Page::Gather, Some("9"));
        assert!(xml.contains(
            r#"<Gather action="/voice?page=secret" numDigits="4" method="POST">"#
        ));
        assert!(xml.contains("Please enter the secret code now."));
        assert!(xml.contains("<Redirect>/voice</Redirect>"));
        assert!(!xml.contains("<Dial>"));
    }

    #[test]
    fn secret_prompt_length_tracks_configured_code() {
        let xml = rendered(&test_config(Some("007123"), 1), Page::Gather, Some("9"));
        assert!(xml.contains(r#"numDigits="6""#), "{xml}");
    }

    #[test]
    fn gather_digit_nine_dials_ninth_roommate_when_secret_disabled() {
        let xml = rendered(&test_config(None, 9), Page::Gather, Some("9"));
        assert!(xml.contains("Connecting you to Max"));
        assert!(xml.contains("<Dial>415-555-5555</Dial>"));
        assert!(!xml.contains("secret"));
    }

    #[test]
    fn gather_out_of_range_digit_only_redirects() {
        let xml = rendered(&test_config(Some("1234"), 2), Page::Gather, Some("99"));
        assert_eq!(xml, REDIRECT_ONLY);
    }

    #[test]
    fn gather_zero_and_garbage_only_redirect() {
        let config = test_config(Some("1234"), 2);
        assert_eq!(rendered(&config, Page::Gather, Some("0")), REDIRECT_ONLY);
        assert_eq!(rendered(&config, Page::Gather, Some("abc")), REDIRECT_ONLY);
        assert_eq!(rendered(&config, Page::Gather, None), REDIRECT_ONLY);
    }

    #[test]
    fn secret_match_buzzes_in() {
        let xml = rendered(&test_config(Some("1234"), 2), Page::Secret, Some("1234"));
        let say = xml
            .find(r#"<Say voice="woman">Buzzing you in now.</Say>"#)
            .expect("buzz announcement");
        let play = xml
            .find("<Play>http://www.dialabc.com/i/cache/dtmfgen/wavpcm8.300/7.wav</Play>")
            .expect("buzzer clip with gate code");
        let redirect = xml.find("<Redirect>/voice</Redirect>").expect("redirect");
        assert!(say < play && play < redirect, "{xml}");
    }

    #[test]
    fn secret_mismatch_only_redirects() {
        let xml = rendered(&test_config(Some("1234"), 2), Page::Secret, Some("0000"));
        assert_eq!(xml, REDIRECT_ONLY);
    }

    #[test]
    fn secret_comparison_is_string_exact() {
        let config = test_config(Some("0123"), 2);
        assert_eq!(rendered(&config, Page::Secret, Some("123")), REDIRECT_ONLY);
        assert!(rendered(&config, Page::Secret, Some("0123")).contains("Buzzing you in now."));
    }

    #[test]
    fn secret_page_with_feature_disabled_only_redirects() {
        let xml = rendered(&test_config(None, 2), Page::Secret, Some("1234"));
        assert_eq!(xml, REDIRECT_ONLY);
    }

    #[test]
    fn page_parsing_defaults_to_menu() {
        assert_eq!(Page::from_param(Some("gather")), Page::Gather);
        assert_eq!(Page::from_param(Some("secret")), Page::Secret);
        assert_eq!(Page::from_param(Some("anything")), Page::Menu);
        assert_eq!(Page::from_param(None), Page::Menu);
    }
}
