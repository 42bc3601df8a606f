//! Fixed option lists offered by the registration form.

use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::Error;

macro_rules! labelled_options {
    ($name:ident, $kind:literal, { $($variant:ident => $label:literal,)+ }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|option| option.label() == wanted)
                    .ok_or_else(|| Error::UnknownOption {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

labelled_options!(Profession, "profession", {
    Student => "Student",
    Teacher => "Teacher",
    Doctor => "Doctor",
    Engineer => "Engineer",
    Lawyer => "Lawyer",
    Accountant => "Accountant",
    Farmer => "Farmer",
    BusinessOwner => "Business Owner",
    GovernmentEmployee => "Government Employee",
    ItProfessional => "IT Professional",
    HealthcareWorker => "Healthcare Worker",
    SocialWorker => "Social Worker",
    Retired => "Retired",
    Homemaker => "Homemaker",
    Other => "Other",
});

labelled_options!(IndianState, "state", {
    AndhraPradesh => "Andhra Pradesh",
    ArunachalPradesh => "Arunachal Pradesh",
    Assam => "Assam",
    Bihar => "Bihar",
    Chhattisgarh => "Chhattisgarh",
    Goa => "Goa",
    Gujarat => "Gujarat",
    Haryana => "Haryana",
    HimachalPradesh => "Himachal Pradesh",
    Jharkhand => "Jharkhand",
    Karnataka => "Karnataka",
    Kerala => "Kerala",
    MadhyaPradesh => "Madhya Pradesh",
    Maharashtra => "Maharashtra",
    Manipur => "Manipur",
    Meghalaya => "Meghalaya",
    Mizoram => "Mizoram",
    Nagaland => "Nagaland",
    Odisha => "Odisha",
    Punjab => "Punjab",
    Rajasthan => "Rajasthan",
    Sikkim => "Sikkim",
    TamilNadu => "Tamil Nadu",
    Telangana => "Telangana",
    Tripura => "Tripura",
    UttarPradesh => "Uttar Pradesh",
    Uttarakhand => "Uttarakhand",
    WestBengal => "West Bengal",
});

labelled_options!(IdType, "ID type", {
    Aadhaar => "Aadhaar Card",
    Pan => "PAN Card",
    VoterId => "Voter ID",
    DrivingLicense => "Driving License",
    Passport => "Passport",
});
