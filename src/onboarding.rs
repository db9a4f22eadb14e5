//! Chef onboarding: the four-step profile wizard and its checks

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, ValidationErrors};
use crate::validation::{check_full_name, check_phone};

/// How a chef wants to be paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutMethod {
    Stripe,
    Paypal,
    Bank,
}

/// Everything the wizard collects; serialized straight into the `chefs` row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChefOnboarding {
    // Basic info
    pub full_name: String,
    pub phone_number: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,

    // Specialization
    pub specialties: Vec<String>,
    pub experience: String,
    pub bio: String,
    pub certifications: Vec<String>,
    pub dish_images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_video: Option<String>,

    // Availability, weekday -> time slots
    pub availability: BTreeMap<String, Vec<String>>,
    pub hourly_rate: f64,
    pub service_types: Vec<String>,
    pub service_radius: String,

    // Verification
    pub payout_method: Option<PayoutMethod>,
    pub government_id: String,
    pub terms_accepted: bool,
}

/// Wizard pages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OnboardingStep {
    BasicInfo,
    Specialization,
    Availability,
    Verification,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 4] = [
        OnboardingStep::BasicInfo,
        OnboardingStep::Specialization,
        OnboardingStep::Availability,
        OnboardingStep::Verification,
    ];

    /// 1-based position, as shown in "Step n of 4"
    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    pub fn next(&self) -> Option<OnboardingStep> {
        Self::ALL.get(self.number()).copied()
    }

    pub fn previous(&self) -> Option<OnboardingStep> {
        self.number().checked_sub(2).map(|i| Self::ALL[i])
    }
}

fn require(errors: &mut ValidationErrors, field: &'static str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.add(field, message);
    }
}

impl ChefOnboarding {
    /// Check the fields of one page
    pub fn validate_step(&self, step: OnboardingStep) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();

        match step {
            OnboardingStep::BasicInfo => {
                check_full_name(&mut errors, "full_name", &self.full_name);
                check_phone(&mut errors, "phone_number", &self.phone_number);
                require(&mut errors, "location", &self.location, "Location is required");
            }
            OnboardingStep::Specialization => {
                if self.specialties.is_empty() {
                    errors.add("specialties", "Select at least one specialty");
                }
                require(&mut errors, "experience", &self.experience, "Experience is required");
                require(&mut errors, "bio", &self.bio, "Bio is required");
                if self.dish_images.is_empty() {
                    errors.add("dish_images", "Add at least one dish photo");
                }
            }
            OnboardingStep::Availability => {
                if self.availability.values().all(|slots| slots.is_empty()) {
                    errors.add("availability", "Pick at least one available time slot");
                }
                if !(self.hourly_rate.is_finite() && self.hourly_rate > 0.0) {
                    errors.add("hourly_rate", "Hourly rate must be greater than zero");
                }
                if self.service_types.is_empty() {
                    errors.add("service_types", "Select at least one service type");
                }
                require(
                    &mut errors,
                    "service_radius",
                    &self.service_radius,
                    "Service radius is required",
                );
            }
            OnboardingStep::Verification => {
                if self.payout_method.is_none() {
                    errors.add("payout_method", "Choose a payout method");
                }
                require(
                    &mut errors,
                    "government_id",
                    &self.government_id,
                    "Government ID is required",
                );
                if !self.terms_accepted {
                    errors.add("terms_accepted", "You must accept the terms");
                }
            }
        }

        errors.into_result()
    }

    /// Check every page; the error lists the fields of all failing pages
    pub fn validate(&self) -> Result<(), Error> {
        let mut all = ValidationErrors::new();
        for step in OnboardingStep::ALL {
            if let Err(Error::Validation(errors)) = self.validate_step(step) {
                for e in errors.iter() {
                    all.add(e.field, e.message.clone());
                }
            }
        }
        all.into_result()
    }
}

/// Step-by-step navigation over a `ChefOnboarding` form
#[derive(Debug, Clone)]
pub struct OnboardingWizard {
    step: OnboardingStep,
    pub form: ChefOnboarding,
}

impl Default for OnboardingWizard {
    fn default() -> Self {
        Self::new(ChefOnboarding::default())
    }
}

impl OnboardingWizard {
    /// Start on the first page, optionally pre-filled
    pub fn new(form: ChefOnboarding) -> Self {
        Self {
            step: OnboardingStep::BasicInfo,
            form,
        }
    }

    pub fn step(&self) -> OnboardingStep {
        self.step
    }

    /// Current page out of the total, e.g. `(2, 4)`
    pub fn progress(&self) -> (usize, usize) {
        (self.step.number(), OnboardingStep::ALL.len())
    }

    pub fn is_last_step(&self) -> bool {
        self.step.next().is_none()
    }

    /// Validate the current page and move forward.
    ///
    /// Stays put on the last page; the form is submitted from there.
    pub fn next(&mut self) -> Result<OnboardingStep, Error> {
        self.form.validate_step(self.step)?;
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        Ok(self.step)
    }

    /// Go back one page without validating
    pub fn back(&mut self) -> OnboardingStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// The finished form, once every page validates
    pub fn finish(&self) -> Result<&ChefOnboarding, Error> {
        self.form.validate()?;
        Ok(&self.form)
    }
}
