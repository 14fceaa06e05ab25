/*
Simple i18n helper for the backend.

This module provides:
- A tiny embedded translations store for EN/NE (compile-time embedded JSON).
- A simple `tr` function to lookup translations by key + optional params.
- A `t` convenience wrapper using the default language (DEFAULT_LANG).

Usage:
    use crate::i18n;
    let msg = i18n::t("enrollment.already_enrolled");
    let msg_with = i18n::tr(Some("ne"), "enrollment.success", Some(&[("course", "IELTS Prep")]));

Notes:
- Placeholders in translation strings use single-brace format: `{name}`.
- Default language is `en`. If a key is missing for the requested language,
  the fallback language will be used.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANG: &str = "en";

static TRANSLATIONS: OnceLock<HashMap<String, HashMap<String, String>>> = OnceLock::new();

const EN_JSON: &str = r#"
{
  "auth.invalid_credentials": "Invalid username/email or password.",
  "auth.registered": "Account created. You can now log in.",
  "validation.form_invalid": "Please correct the errors below.",
  "validation.required": "This field is required.",
  "validation.username_taken": "This username is already taken. Please choose a different username.",
  "validation.email_taken": "This email address is already registered. Please use a different email or try logging in.",
  "validation.email_invalid": "Enter a valid email address.",
  "validation.mobile_invalid": "Please enter a valid mobile number.",
  "validation.phone_invalid": "Please enter a valid phone number.",
  "validation.password_mismatch": "The two password fields didn't match.",
  "validation.password_too_short": "This password is too short. It must contain at least 8 characters.",
  "validation.cv_required": "Please upload your CV.",
  "validation.cv_not_pdf": "Only PDF files are allowed.",
  "validation.cv_too_large": "File size must not exceed {max_mb}MB.",
  "validation.rating_range": "Rating must be between 1 and 5.",
  "validation.schedule_time_order": "Start time must not be later than end time.",
  "validation.unknown_weekday": "Unknown weekday: {day}",
  "validation.discount_range": "Discount must be between 0 and 100 percent.",
  "validation.amount_negative": "Amount cannot be negative.",
  "validation.amount_too_large": "Amount cannot exceed {max}.",
  "validation.unknown_payment_method": "Unknown payment method: {method}",
  "validation.unknown_choice": "Unknown value: {value}",
  "validation.openings_min": "There must be at least one opening.",
  "not_found.course": "Course not found",
  "not_found.enrollment": "Enrollment not found",
  "not_found.vacancy": "Vacancy not found",
  "not_found.application": "Application not found",
  "not_found.review": "Review not found",
  "not_found.user": "User not found",
  "enrollment.already_enrolled": "You are already enrolled in this course.",
  "enrollment.pending_created": "Enrollment created. Complete the payment to get access.",
  "enrollment.pending_existing": "You have a pending enrollment for this course. Complete the payment to get access.",
  "enrollment.resubmitted": "Your previous payment failed. The enrollment has been reopened for payment.",
  "enrollment.refunded_conflict": "This enrollment was refunded. Please contact the office to enroll again.",
  "enrollment.payment_already_completed": "Payment already completed.",
  "enrollment.success": "Successfully enrolled in {course}!",
  "enrollment.not_pending": "Only pending enrollments can be confirmed.",
  "enrollment.not_completed": "Only completed enrollments can be refunded.",
  "enrollment.refunded": "Enrollment refunded.",
  "enrollment.marked_failed": "Enrollment payment marked as failed.",
  "application.duplicate": "You have already applied for this vacancy with this email.",
  "application.submitted": "Application submitted. Please pay the application fee to complete it.",
  "application.vacancy_closed": "This vacancy is no longer accepting applications.",
  "application.payment_already_completed": "Payment already completed.",
  "application.payment_success": "Payment successful! Your application has been submitted.",
  "application.not_pending": "Only pending applications can be confirmed.",
  "application.status_updated": "Application status updated.",
  "application.resubmitted": "Your previous payment failed. The application has been reopened for payment.",
  "application.fail_not_pending": "Only applications with a pending fee can be marked as failed.",
  "application.marked_failed": "Application payment marked as failed.",
  "review.requires_enrollment": "You must complete enrollment in this course before reviewing it.",
  "review.saved": "Thank you for your review!",
  "review.deleted": "Your review has been deleted.",
  "reminder.starting_soon": "{course} starts in {minutes} minutes.",
  "admin.courses_activated": "{count} courses activated.",
  "admin.courses_deactivated": "{count} courses deactivated.",
  "admin.notifications_reset": "{count} enrollment(s) notification reset.",
  "app.name": "Creative Education Foundation"
}
"#;

const NE_JSON: &str = r#"
{
  "auth.invalid_credentials": "प्रयोगकर्ता नाम/इमेल वा पासवर्ड गलत छ।",
  "auth.registered": "खाता बनाइयो। अब तपाईं लगइन गर्न सक्नुहुन्छ।",
  "validation.form_invalid": "कृपया तलका त्रुटिहरू सच्याउनुहोस्।",
  "validation.required": "यो क्षेत्र आवश्यक छ।",
  "validation.username_taken": "यो प्रयोगकर्ता नाम पहिले नै लिइएको छ। कृपया अर्को नाम छान्नुहोस्।",
  "validation.email_taken": "यो इमेल ठेगाना पहिले नै दर्ता भइसकेको छ। कृपया अर्को इमेल प्रयोग गर्नुहोस् वा लगइन गर्नुहोस्।",
  "validation.email_invalid": "मान्य इमेल ठेगाना लेख्नुहोस्।",
  "validation.mobile_invalid": "कृपया मान्य मोबाइल नम्बर लेख्नुहोस्।",
  "validation.phone_invalid": "कृपया मान्य फोन नम्बर लेख्नुहोस्।",
  "validation.password_mismatch": "दुवै पासवर्ड मिलेनन्।",
  "validation.password_too_short": "पासवर्ड धेरै छोटो छ। कम्तीमा ८ अक्षर हुनुपर्छ।",
  "validation.cv_required": "कृपया आफ्नो CV अपलोड गर्नुहोस्।",
  "validation.cv_not_pdf": "PDF फाइल मात्र स्वीकार्य छ।",
  "validation.cv_too_large": "फाइलको आकार {max_mb}MB भन्दा बढी हुनु हुँदैन।",
  "validation.rating_range": "रेटिङ १ देखि ५ सम्म हुनुपर्छ।",
  "enrollment.already_enrolled": "तपाईं यस कोर्समा पहिले नै भर्ना हुनुहुन्छ।",
  "enrollment.payment_already_completed": "भुक्तानी पहिले नै सम्पन्न भइसकेको छ।",
  "enrollment.success": "{course} मा सफलतापूर्वक भर्ना हुनुभयो!",
  "application.duplicate": "तपाईंले यो इमेलबाट यस पदका लागि पहिले नै आवेदन दिनुभएको छ।",
  "application.payment_already_completed": "भुक्तानी पहिले नै सम्पन्न भइसकेको छ।",
  "application.payment_success": "भुक्तानी सफल भयो! तपाईंको आवेदन पेश गरियो।",
  "review.saved": "तपाईंको समीक्षाका लागि धन्यवाद!",
  "review.deleted": "तपाईंको समीक्षा हटाइयो।",
  "reminder.starting_soon": "{course} {minutes} मिनेटमा सुरु हुँदैछ।",
  "app.name": "क्रिएटिभ एजुकेशन फाउन्डेसन"
}
"#;

/// Initialize translations map (lazy).
fn build_translations() -> HashMap<String, HashMap<String, String>> {
    let mut out: HashMap<String, HashMap<String, String>> = HashMap::new();

    let en_map: HashMap<String, String> = serde_json::from_str(EN_JSON).unwrap_or_else(|e| {
        panic!("failed to parse EN_JSON in i18n module: {}", e);
    });
    out.insert("en".to_string(), en_map);

    let ne_map: HashMap<String, String> = serde_json::from_str(NE_JSON).unwrap_or_else(|e| {
        panic!("failed to parse NE_JSON in i18n module: {}", e);
    });
    out.insert("ne".to_string(), ne_map);

    out
}

/// Returns the global translations map (lang -> (key -> message)).
fn translations() -> &'static HashMap<String, HashMap<String, String>> {
    TRANSLATIONS.get_or_init(build_translations)
}

/// Normalize a language tag into a short, lowercase code (e.g. "ne-NP" -> "ne").
pub fn normalize_language(lang: &str) -> String {
    lang.split('-').next().unwrap_or(lang).to_lowercase()
}

/// Returns true if the given language code is supported (e.g. "en", "ne").
pub fn is_supported_language(lang: &str) -> bool {
    translations().contains_key(lang)
}

/// Translate a key using an explicit language (or default if None).
///
/// Missing keys fall back to the default language, then to the key itself.
pub fn tr(lang: Option<&str>, key: &str, params: Option<&[(&str, &str)]>) -> String {
    let map = translations();

    let desired = lang.unwrap_or(DEFAULT_LANG);

    let val = map
        .get(desired)
        .and_then(|m| m.get(key))
        .cloned()
        .or_else(|| map.get(DEFAULT_LANG).and_then(|m| m.get(key)).cloned())
        .unwrap_or_else(|| key.to_string());

    if let Some(params) = params {
        let mut s = val;
        for (k, v) in params {
            s = s.replace(&format!("{{{}}}", k), v);
        }
        s
    } else {
        val
    }
}

/// Convenience wrapper: translate using default language (DEFAULT_LANG).
pub fn t(key: &str) -> String {
    tr(None, key, None)
}

/// Convenience wrapper with params (default language).
pub fn t_with(key: &str, params: &[(&str, &str)]) -> String {
    tr(None, key, Some(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tr_basic() {
        let s = tr(Some("en"), "enrollment.already_enrolled", None);
        assert!(s.contains("already enrolled"));
    }

    #[test]
    fn test_t_with_params() {
        let s = t_with(
            "reminder.starting_soon",
            &[("course", "IELTS Preparation"), ("minutes", "8")],
        );
        assert_eq!(s, "IELTS Preparation starts in 8 minutes.");
    }

    #[test]
    fn test_fallback_to_default() {
        // "ne" has no entry for this key, falls back to English
        let s = tr(Some("ne"), "validation.unknown_weekday", Some(&[("day", "funday")][..]));
        assert_eq!(s, "Unknown weekday: funday");
    }

    #[test]
    fn missing_key_returns_key() {
        let k = "non.existent.key";
        assert_eq!(t(k), k.to_string());
    }

    #[test]
    fn test_is_supported_language() {
        assert!(is_supported_language("en"));
        assert!(is_supported_language("ne"));
        assert!(!is_supported_language("fr"));
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("ne-NP"), "ne");
        assert_eq!(normalize_language("EN-us"), "en");
    }
}
