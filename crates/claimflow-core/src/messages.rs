//! Human-readable sentences for stable error keys.
//!
//! Validation emits keys; this table turns them into copy shown to the
//! visitor. Keeping it separate lets the copy change (or be localized)
//! without touching validation logic. Unknown keys fall through verbatim so
//! a missing entry degrades visibly instead of crashing.

/// Translates a stable error key into the visitor-facing sentence.
pub fn friendly_message(key: &str) -> &str {
    match key {
        "iva.required" => "Please tell us whether you've had an IVA or bankruptcy.",
        "title.required" => "Please choose a title (Mr / Mrs / Miss / Ms).",
        "firstName.required" => "Please enter your first name.",
        "firstName.minLength" => "First name must be at least 2 letters.",
        "firstName.invalidChars" => "First name may only contain letters and spaces.",
        "firstName.tooLong" => "First name is too long.",
        "lastName.required" => "Please enter your last name.",
        "lastName.minLength" => "Last name must be at least 2 letters.",
        "lastName.invalidChars" => "Last name may only contain letters and spaces.",
        "lastName.tooLong" => "Last name is too long.",
        "dob.required" => "Please enter your date of birth.",
        "dob.invalid" => "Please enter a valid date.",
        "dob.underage" => "You must be 18 or older to continue.",
        "email.required" => "Please enter your email address.",
        "email.invalidFormat" => "Please enter a valid email address (example@domain.com).",
        "phone.required" => "Please enter your mobile number.",
        "phone.format" => {
            "Enter a UK mobile number starting with 07 and 11 digits (e.g. 07123 456789)."
        }
        "consent.required" => "You must accept to continue.",
        "signature.required" => "Please sign in the box to continue.",
        "signature.tooLarge" => "Your signature image is too large. Please clear and sign again.",
        "signature.uploadFailed" => "We couldn't save your signature. Please try again.",
        "signature.invalid" => "Your signature could not be read. Please clear and sign again.",
        "currentPostcode.required" => "Please enter your postcode.",
        "currentPostcode.format" => "Please enter a valid UK postcode (e.g. SW1A 1AA).",
        "currentPostcode.lookupNoResults" => {
            "No addresses found for that postcode. Enter your address manually."
        }
        "currentPostcode.lookupFailed" => "Address lookup failed. Please try again.",
        "currentPostcode.selectAddressRequired" => {
            "Please select your address from the list before continuing."
        }
        "previousPostcode.required" => {
            "Please fill the previous postcode or remove the previous address."
        }
        "previousPostcode.format" => "Please enter a valid UK postcode (e.g. SW1A 1AA).",
        "previousPostcode.selectAddressRequired" => {
            "Please select the previous address from the list before continuing."
        }
        "address.field.required" => "Please complete the highlighted address fields.",
        "field.required" => "This field is required.",
        "field.tooLong" => "Too long. Please shorten this field.",
        "field.invalid" => "Invalid value. Please check and try again.",
        "stepId.unknown" => "Unknown step.",
        "formId.required" => "Missing form reference. Please start again.",
        other => other,
    }
}
