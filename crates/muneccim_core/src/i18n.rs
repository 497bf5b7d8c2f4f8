//! crates/muneccim_core/src/i18n.rs
//!
//! Static display strings for the two supported languages.

use serde::{Deserialize, Serialize};

use crate::assessment::QUESTION_COUNT;
use crate::domain::SkillLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Tr,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Tr => "tr",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "tr" => Some(Language::Tr),
            _ => None,
        }
    }

    /// Picks the first supported language from an `Accept-Language` header value.
    pub fn from_accept_language(header: &str) -> Self {
        header
            .split(',')
            .filter_map(|part| part.split(';').next())
            .filter_map(|tag| tag.trim().split('-').next())
            .find_map(Language::from_code)
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct Question {
    pub prompt: &'static str,
    pub options: [&'static str; 5],
}

#[derive(Debug, Serialize)]
pub struct Guidance {
    pub heading: &'static str,
    pub tips: [&'static str; 4],
}

#[derive(Debug, Serialize)]
pub struct Translations {
    pub train_model: &'static str,
    pub chat_history: &'static str,
    pub new_chat: &'static str,
    pub question: &'static str,
    pub of: &'static str,
    pub upload_prompt: &'static str,
    pub logout: &'static str,

    pub questions: [Question; QUESTION_COUNT],
    pub beginner: Guidance,
    pub intermediate: Guidance,
    pub advanced: Guidance,

    pub step_processing_data: &'static str,
    pub step_training_model: &'static str,
    pub step_finalizing: &'static str,
    pub step_completed: &'static str,
    /// `{n}` is replaced with the count.
    pub seconds_remaining: &'static str,
    pub minutes_remaining: &'static str,

    pub invalid_format: &'static str,
    pub file_too_large: &'static str,
    pub unreadable_dataset: &'static str,
    pub upload_failed: &'static str,
    pub history_failed: &'static str,
    pub analysis_failed: &'static str,
    pub assessment_failed: &'static str,
    pub assessment_pending: &'static str,
    pub busy: &'static str,
    pub no_dataset: &'static str,

    pub email_required: &'static str,
    pub email_invalid: &'static str,
    pub password_too_short: &'static str,
    pub password_needs_uppercase: &'static str,
    pub password_needs_lowercase: &'static str,
    pub password_needs_digit: &'static str,
    pub password_needs_special: &'static str,
    pub passwords_mismatch: &'static str,
    pub registration_failed: &'static str,
    pub invalid_credentials: &'static str,
}

impl Translations {
    pub fn guidance(&self, level: SkillLevel) -> &Guidance {
        match level {
            SkillLevel::Beginner => &self.beginner,
            SkillLevel::Intermediate => &self.intermediate,
            SkillLevel::Advanced => &self.advanced,
        }
    }
}

pub fn translations(language: Language) -> &'static Translations {
    match language {
        Language::En => &EN,
        Language::Tr => &TR,
    }
}

static EN: Translations = Translations {
    train_model: "Train Model",
    chat_history: "Chat History",
    new_chat: "New Chat",
    question: "Question",
    of: "of",
    upload_prompt: "Drop your file here or click to upload",
    logout: "Logout",

    questions: [
        Question {
            prompt: "What is your experience with machine learning?",
            options: [
                "No experience",
                "Basic understanding",
                "Some practical experience",
                "Professional experience",
                "Expert level",
            ],
        },
        Question {
            prompt: "Have you ever trained an AI model before?",
            options: [
                "Never",
                "Once or twice",
                "Several times",
                "Regularly",
                "Expert in model training",
            ],
        },
        Question {
            prompt: "How familiar are you with data preprocessing?",
            options: [
                "Not familiar at all",
                "Basic understanding",
                "Moderate experience",
                "Advanced experience",
                "Expert level",
            ],
        },
        Question {
            prompt: "What is your understanding of model parameters and hyperparameters?",
            options: [
                "No understanding",
                "Basic concept",
                "Moderate understanding",
                "Advanced knowledge",
                "Expert level",
            ],
        },
        Question {
            prompt: "How would you rate your ability to evaluate model performance?",
            options: [
                "No ability",
                "Basic metrics only",
                "Moderate understanding",
                "Advanced understanding",
                "Expert level",
            ],
        },
    ],
    beginner: Guidance {
        heading: "Beginner Recommendations:",
        tips: [
            "Start with small, clean datasets",
            "Use basic model configurations",
            "Focus on understanding the fundamentals",
            "Consider using our guided training mode",
        ],
    },
    intermediate: Guidance {
        heading: "Intermediate Recommendations:",
        tips: [
            "Experiment with different model architectures",
            "Try advanced preprocessing techniques",
            "Explore hyperparameter tuning",
            "Consider using cross-validation",
        ],
    },
    advanced: Guidance {
        heading: "Advanced Recommendations:",
        tips: [
            "Access to all advanced features",
            "Custom model architectures available",
            "Advanced optimization techniques",
            "Full control over training parameters",
        ],
    },

    step_processing_data: "Processing data...",
    step_training_model: "Training model...",
    step_finalizing: "Finalizing results...",
    step_completed: "Training completed",
    seconds_remaining: "About {n} seconds remaining",
    minutes_remaining: "About {n} minutes remaining",

    invalid_format: "Invalid file format. Please upload a CSV or XLSX file.",
    file_too_large: "File size must not exceed 5 MB.",
    unreadable_dataset: "The file could not be read as a table.",
    upload_failed: "File upload failed. Please try again.",
    history_failed: "Could not load your upload history.",
    analysis_failed: "Analysis failed. Please try again.",
    assessment_failed: "Could not save your assessment. Please try again.",
    assessment_pending: "Please complete the assessment first.",
    busy: "Another operation is still running.",
    no_dataset: "Upload a dataset before starting training.",

    email_required: "Email is required",
    email_invalid: "Email is invalid",
    password_too_short: "Password must be at least 8 characters long",
    password_needs_uppercase: "Password must contain at least one uppercase letter",
    password_needs_lowercase: "Password must contain at least one lowercase letter",
    password_needs_digit: "Password must contain at least one number",
    password_needs_special: "Password must contain at least one special character (!@#$%^&*)",
    passwords_mismatch: "Passwords do not match",
    registration_failed: "Registration failed",
    invalid_credentials: "Invalid email or password",
};

static TR: Translations = Translations {
    train_model: "Modeli Eğit",
    chat_history: "Sohbet Geçmişi",
    new_chat: "Yeni Sohbet",
    question: "Soru",
    of: "için",
    upload_prompt: "Dosyanızı buraya bırakın veya yüklemek için tıklayın",
    logout: "Çıkış Yap",

    questions: [
        Question {
            prompt: "Makine öğrenimi konusundaki deneyiminiz nedir?",
            options: [
                "Deneyim yok",
                "Temel anlayış",
                "Biraz pratik deneyim",
                "Profesyonel deneyim",
                "Uzman seviyesi",
            ],
        },
        Question {
            prompt: "Daha önce hiç yapay zeka modeli eğittiniz mi?",
            options: [
                "Hiç",
                "Bir veya iki kez",
                "Birkaç kez",
                "Düzenli olarak",
                "Model eğitiminde uzman",
            ],
        },
        Question {
            prompt: "Veri ön işleme konusunda ne kadar bilgilisiniz?",
            options: [
                "Hiç aşina değil",
                "Temel anlayış",
                "Orta düzey deneyim",
                "İleri düzey deneyim",
                "Uzman seviyesi",
            ],
        },
        Question {
            prompt: "Model parametreleri ve hiperparametreler hakkındaki anlayışınız nedir?",
            options: [
                "Anlayış yok",
                "Temel kavram",
                "Orta düzey anlayış",
                "İleri düzey bilgi",
                "Uzman seviyesi",
            ],
        },
        Question {
            prompt: "Model performansını değerlendirme becerinizi nasıl derecelendirirsiniz?",
            options: [
                "Yetenek yok",
                "Sadece temel metrikler",
                "Orta düzey anlayış",
                "İleri düzey anlayış",
                "Uzman seviyesi",
            ],
        },
    ],
    beginner: Guidance {
        heading: "Başlangıç Önerileri:",
        tips: [
            "Küçük, temiz veri setleri ile başlayın",
            "Temel model yapılandırmalarını kullanın",
            "Temel kavramları anlamaya odaklanın",
            "Rehberli eğitim modumuzu kullanmayı düşünün",
        ],
    },
    intermediate: Guidance {
        heading: "Orta Seviye Öneriler:",
        tips: [
            "Farklı model mimarileri ile deney yapın",
            "Gelişmiş ön işleme tekniklerini deneyin",
            "Hiperparametre ayarlamayı keşfedin",
            "Çapraz doğrulama kullanmayı düşünün",
        ],
    },
    advanced: Guidance {
        heading: "İleri Düzey Öneriler:",
        tips: [
            "Tüm gelişmiş özelliklere erişim",
            "Özel model mimarileri mevcut",
            "Gelişmiş optimizasyon teknikleri",
            "Eğitim parametreleri üzerinde tam kontrol",
        ],
    },

    step_processing_data: "Veriler işleniyor...",
    step_training_model: "Model eğitiliyor...",
    step_finalizing: "Sonuçlar hazırlanıyor...",
    step_completed: "Eğitim tamamlandı",
    seconds_remaining: "Yaklaşık {n} saniye kaldı",
    minutes_remaining: "Yaklaşık {n} dakika kaldı",

    invalid_format: "Geçersiz dosya formatı. Lütfen CSV veya XLSX dosyası yükleyin.",
    file_too_large: "Dosya boyutu 5 MB'ı geçmemelidir.",
    unreadable_dataset: "Dosya tablo olarak okunamadı.",
    upload_failed: "Dosya yüklenemedi. Lütfen tekrar deneyin.",
    history_failed: "Yükleme geçmişi alınamadı.",
    analysis_failed: "Analiz başarısız oldu. Lütfen tekrar deneyin.",
    assessment_failed: "Değerlendirmeniz kaydedilemedi. Lütfen tekrar deneyin.",
    assessment_pending: "Lütfen önce değerlendirmeyi tamamlayın.",
    busy: "Başka bir işlem hâlâ devam ediyor.",
    no_dataset: "Eğitime başlamadan önce bir veri seti yükleyin.",

    email_required: "E-posta gerekli",
    email_invalid: "E-posta geçersiz",
    password_too_short: "Şifre en az 8 karakter uzunluğunda olmalıdır",
    password_needs_uppercase: "Şifre en az bir büyük harf içermelidir",
    password_needs_lowercase: "Şifre en az bir küçük harf içermelidir",
    password_needs_digit: "Şifre en az bir rakam içermelidir",
    password_needs_special: "Şifre en az bir özel karakter içermelidir (!@#$%^&*)",
    passwords_mismatch: "Şifreler eşleşmiyor",
    registration_failed: "Kayıt başarısız oldu",
    invalid_credentials: "Geçersiz e-posta veya şifre",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_language_picks_first_supported_tag() {
        assert_eq!(Language::from_accept_language("tr-TR,tr;q=0.9,en;q=0.8"), Language::Tr);
        assert_eq!(Language::from_accept_language("de-DE, en-US;q=0.7"), Language::En);
        assert_eq!(Language::from_accept_language("fr"), Language::En);
        assert_eq!(Language::from_accept_language(""), Language::En);
    }

    #[test]
    fn every_skill_level_has_four_tips_in_both_languages() {
        for language in [Language::En, Language::Tr] {
            for level in [
                SkillLevel::Beginner,
                SkillLevel::Intermediate,
                SkillLevel::Advanced,
            ] {
                let guidance = translations(language).guidance(level);
                assert!(!guidance.heading.is_empty());
                assert!(guidance.tips.iter().all(|tip| !tip.is_empty()));
            }
        }
    }
}
