//! User-facing texts returned in `{ "error": ... }` envelopes.

use axum::http::{header::ACCEPT_LANGUAGE, HeaderMap};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ar,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "ar" => Ok(Locale::Ar),
            other => Err(format!("unsupported locale '{other}'")),
        }
    }
}

impl Locale {
    /// Picks Arabic when the first acceptable language tag is Arabic,
    /// English when it is English, otherwise `fallback`.
    pub fn from_headers(headers: &HeaderMap, fallback: Locale) -> Locale {
        let Some(raw) = headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok()) else {
            return fallback;
        };
        let first = raw
            .split(',')
            .map(|tag| tag.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .find(|tag| !tag.is_empty() && tag != "*");
        match first.as_deref() {
            Some(tag) if tag.starts_with("ar") => Locale::Ar,
            Some(tag) if tag.starts_with("en") => Locale::En,
            _ => fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    MissingDescription,
    MissingPrompt,
    MissingEditRequest,
    MissingOriginalImage,
    ImageNotDataUrl,
    MissingApiKey,
    ServiceBusyShortly,
    ServiceBusyMinute,
    EnhanceFailed,
    EnhanceUnexpected,
    GenerateFailed,
    GenerateUnexpected,
    EditFailed,
    EditUnexpected,
    InvalidApiKey,
    QuotaExceeded,
    ModelUnavailable,
    MalformedBody,
    DesignNotFound,
    StepNotFound,
}

impl Message {
    pub fn text(self, locale: Locale) -> &'static str {
        use Message::*;
        match locale {
            Locale::En => match self {
                MissingDescription => "Please describe the dress or complete the questionnaire",
                MissingPrompt => "Please enter a prompt",
                MissingEditRequest => "Please describe the change you want",
                MissingOriginalImage => "The original image is missing",
                ImageNotDataUrl => "Invalid image format. It must be a Base64 data URL",
                MissingApiKey => "The OpenRouter API key is not configured",
                ServiceBusyShortly => "The service is busy right now. Please try again shortly.",
                ServiceBusyMinute => "The service is busy right now. Please try again in a minute.",
                EnhanceFailed => "Failed to enhance the prompt",
                EnhanceUnexpected => "Something went wrong while enhancing the prompt",
                GenerateFailed => "Failed to generate the image",
                GenerateUnexpected => "Something went wrong while generating the image",
                EditFailed => "Failed to edit the design",
                EditUnexpected => "Something went wrong while editing the design",
                InvalidApiKey => "Invalid API key",
                QuotaExceeded => "Usage limit exceeded",
                ModelUnavailable => "The model is currently unavailable",
                MalformedBody => "The request body is not valid JSON for this endpoint",
                DesignNotFound => "Design not found",
                StepNotFound => "No such questionnaire step",
            },
            Locale::Ar => match self {
                MissingDescription => "الرجاء إدخال وصف للفستان أو إكمال الاستبيان",
                MissingPrompt => "الرجاء إدخال برومبت",
                MissingEditRequest => "الرجاء إدخال التعديل المطلوب",
                MissingOriginalImage => "الصورة الأصلية غير موجودة",
                ImageNotDataUrl => "تنسيق الصورة غير صحيح. يجب أن تكون Base64 data URL",
                MissingApiKey => "مفتاح OpenRouter API غير موجود",
                ServiceBusyShortly => "الخدمة مزدحمة حالياً. يرجى المحاولة مرة أخرى بعد قليل.",
                ServiceBusyMinute => "الخدمة مزدحمة حالياً. يرجى المحاولة مرة أخرى بعد دقيقة.",
                EnhanceFailed => "فشل في تحسين البرومبت",
                EnhanceUnexpected => "حدث خطأ أثناء تحسين البرومبت",
                GenerateFailed => "فشل في توليد الصورة",
                GenerateUnexpected => "حدث خطأ أثناء توليد الصورة",
                EditFailed => "فشل في تعديل التصميم",
                EditUnexpected => "حدث خطأ أثناء تعديل التصميم",
                InvalidApiKey => "مفتاح API غير صالح",
                QuotaExceeded => "تم تجاوز حد الاستخدام",
                ModelUnavailable => "النموذج غير متاح حالياً",
                MalformedBody => "تنسيق الطلب غير صحيح",
                DesignNotFound => "التصميم غير موجود",
                StepNotFound => "خطوة الاستبيان غير موجودة",
            },
        }
    }
}
