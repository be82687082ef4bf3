//! Request validation for the user and login payloads.
//!
//! Bodies are inspected as raw JSON so that "absent", "null" and "wrong type"
//! can be told apart. String inputs are trimmed (passwords excepted) and an
//! empty string counts as null. A failed `required` check stops the remaining
//! checks for that field; every other failing check adds its own message.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use time::{macros::format_description, Date};

use crate::{config::BirthDateRule, error::FieldErrors, users::model::Gender};

const MAX_LEN: usize = 255;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Reads a request body as JSON regardless of its content type. Anything that
/// does not parse becomes `null`, which the checkers treat like an empty object.
pub fn parse_body(raw: &[u8]) -> Value {
    serde_json::from_slice(raw).unwrap_or(Value::Null)
}

pub fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s, format_description!("[year]-[month]-[day]")).ok()
}

/// Facts the validator needs from outside the request body.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    pub today: Date,
    pub birth_date_rule: BirthDateRule,
    /// Whether the submitted email already belongs to another user.
    pub email_taken: bool,
}

#[derive(Debug, Clone)]
pub struct CreateInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub address: String,
    pub phone: String,
    pub phone_2: Option<String>,
    pub postal_code: String,
    pub birth_date: Date,
    pub gender: Gender,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub phone_2: Option<Option<String>>,
    pub postal_code: Option<String>,
    pub birth_date: Option<Date>,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// The email a uniqueness lookup should be run for, if the body carries one.
pub fn submitted_email(body: &Value) -> Option<String> {
    body.get("email")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

pub fn validate_create(body: &Value, ctx: RuleContext) -> Result<CreateInput, FieldErrors> {
    let mut c = Checker::new(body, Presence::Required);
    let first_name = c.string("first_name");
    let last_name = c.string("last_name");
    let email = c.email("email", ctx.email_taken);
    let password = c.password("password");
    let address = c.string("address");
    let phone = c.string("phone");
    let phone_2 = c.nullable_string("phone_2");
    let postal_code = c.string("postal_code");
    let birth_date = c.birth_date("birth_date", ctx.today, ctx.birth_date_rule);
    let gender = c.gender("gender");

    match (
        first_name, last_name, email, password, address, phone, postal_code, birth_date, gender,
    ) {
        (
            Some(first_name),
            Some(last_name),
            Some(email),
            Some(password),
            Some(address),
            Some(phone),
            Some(postal_code),
            Some(birth_date),
            Some(gender),
        ) if c.errors.is_empty() => Ok(CreateInput {
            first_name,
            last_name,
            email,
            password,
            address,
            phone,
            phone_2: phone_2.flatten(),
            postal_code,
            birth_date,
            gender,
        }),
        _ => Err(c.errors),
    }
}

pub fn validate_update(body: &Value, ctx: RuleContext) -> Result<UpdateInput, FieldErrors> {
    let mut c = Checker::new(body, Presence::Optional);
    let input = UpdateInput {
        first_name: c.string("first_name"),
        last_name: c.string("last_name"),
        email: c.email("email", ctx.email_taken),
        password: c.password("password"),
        address: c.string("address"),
        phone: c.string("phone"),
        phone_2: c.nullable_string("phone_2"),
        postal_code: c.string("postal_code"),
        birth_date: c.birth_date("birth_date", ctx.today, ctx.birth_date_rule),
        gender: c.gender("gender"),
    };
    if c.errors.is_empty() {
        Ok(input)
    } else {
        Err(c.errors)
    }
}

pub fn validate_login(body: &Value) -> Result<Credentials, FieldErrors> {
    let mut c = Checker::new(body, Presence::Required);
    let email = c.email("email", false);
    let password = c.text("password", false);
    match (email, password) {
        (Some(email), Some(password)) if c.errors.is_empty() => Ok(Credentials { email, password }),
        _ => Err(c.errors),
    }
}

/// The error map reported when the store rejects a write on the email constraint.
pub fn email_taken_errors() -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert("email".into(), vec![email_taken_message()]);
    errors
}

fn email_taken_message() -> String {
    "The email has already been taken.".into()
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Required,
    Optional,
}

enum Input {
    Null,
    Str(String),
    Other,
}

struct Checker<'a> {
    body: Option<&'a Map<String, Value>>,
    presence: Presence,
    errors: FieldErrors,
}

impl<'a> Checker<'a> {
    fn new(body: &'a Value, presence: Presence) -> Self {
        Self {
            body: body.as_object(),
            presence,
            errors: FieldErrors::new(),
        }
    }

    fn fail(&mut self, field: &str, message: String) {
        self.errors.entry(field.to_owned()).or_default().push(message);
    }

    fn passed<T>(&self, field: &str, value: T) -> Option<T> {
        if self.errors.contains_key(field) {
            None
        } else {
            Some(value)
        }
    }

    /// Resolves the raw input. `None` means there is nothing left to check:
    /// either the field is optional and absent, or `required` already failed.
    fn present(&mut self, field: &str, trim: bool) -> Option<Input> {
        let raw = self.body.and_then(|b| b.get(field));
        let input = match raw {
            None => None,
            Some(Value::Null) => Some(Input::Null),
            Some(Value::String(s)) => {
                let s = if trim { s.trim() } else { s.as_str() };
                if s.is_empty() {
                    Some(Input::Null)
                } else {
                    Some(Input::Str(s.to_owned()))
                }
            }
            Some(_) => Some(Input::Other),
        };
        match (input, self.presence) {
            (None, Presence::Optional) => None,
            (None | Some(Input::Null), Presence::Required) => {
                self.fail(field, format!("The {} field is required.", label(field)));
                None
            }
            (Some(input), _) => Some(input),
        }
    }

    fn text(&mut self, field: &str, trim: bool) -> Option<String> {
        match self.present(field, trim)? {
            Input::Str(s) => Some(s),
            Input::Null | Input::Other => {
                self.fail(field, format!("The {} field must be a string.", label(field)));
                None
            }
        }
    }

    fn max_len(&mut self, field: &str, s: &str) {
        if s.chars().count() > MAX_LEN {
            self.fail(
                field,
                format!(
                    "The {} field must not be greater than {MAX_LEN} characters.",
                    label(field)
                ),
            );
        }
    }

    fn string(&mut self, field: &str) -> Option<String> {
        let s = self.text(field, true)?;
        self.max_len(field, &s);
        self.passed(field, s)
    }

    fn password(&mut self, field: &str) -> Option<String> {
        let s = self.text(field, false)?;
        self.max_len(field, &s);
        self.passed(field, s)
    }

    fn email(&mut self, field: &str, taken: bool) -> Option<String> {
        let s = self.text(field, true)?;
        if !is_valid_email(&s) {
            self.fail(field, format!("The {} field must be a valid email address.", label(field)));
        }
        if taken {
            self.fail(field, email_taken_message());
        }
        self.max_len(field, &s);
        self.passed(field, s)
    }

    fn nullable_string(&mut self, field: &str) -> Option<Option<String>> {
        let raw = self.body.and_then(|b| b.get(field))?;
        match raw {
            Value::Null => Some(None),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Some(None);
                }
                self.max_len(field, s);
                self.passed(field, Some(s.to_owned()))
            }
            _ => {
                self.fail(field, format!("The {} field must be a string.", label(field)));
                None
            }
        }
    }

    fn birth_date(&mut self, field: &str, today: Date, rule: BirthDateRule) -> Option<Date> {
        let input = self.present(field, true)?;
        let date = match &input {
            Input::Str(s) => parse_date(s),
            Input::Null | Input::Other => None,
        };
        let (ok, side) = match (rule, date) {
            (BirthDateRule::AfterToday, Some(d)) => (d > today, "after"),
            (BirthDateRule::BeforeToday, Some(d)) => (d < today, "before"),
            (BirthDateRule::AfterToday, None) => (false, "after"),
            (BirthDateRule::BeforeToday, None) => (false, "before"),
        };
        if date.is_none() {
            self.fail(field, format!("The {} field must be a valid date.", label(field)));
        }
        if !ok {
            self.fail(field, format!("The {} field must be a date {side} today.", label(field)));
        }
        date.and_then(|d| self.passed(field, d))
    }

    fn gender(&mut self, field: &str) -> Option<Gender> {
        let gender = match self.present(field, true)? {
            Input::Str(s) => Gender::parse(&s),
            Input::Null | Input::Other => None,
        };
        if gender.is_none() {
            self.fail(field, format!("The selected {} is invalid.", label(field)));
        }
        gender
    }
}
