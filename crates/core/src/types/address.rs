//! Checkout address record, persisted under `checkout:address`.

use serde::{Deserialize, Serialize};

/// Shipping address captured by the checkout form.
///
/// Coded fields (`province`, `city`, `district`, `subdistrict`) hold the
/// option value from the cascading selects; the matching `*Label` field holds
/// the text the customer saw. Every field defaults to empty so older or
/// partial records still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub recipient_name: String,
    pub phone: String,
    pub address_line: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub subdistrict: String,
    pub postal_code: String,
    pub courier: String,
    pub service: String,
    pub notes: String,
    #[serde(rename = "provinceLabel", skip_serializing_if = "Option::is_none")]
    pub province_label: Option<String>,
    #[serde(rename = "cityLabel", skip_serializing_if = "Option::is_none")]
    pub city_label: Option<String>,
    #[serde(rename = "districtLabel", skip_serializing_if = "Option::is_none")]
    pub district_label: Option<String>,
    #[serde(rename = "subdistrictLabel", skip_serializing_if = "Option::is_none")]
    pub subdistrict_label: Option<String>,
    #[serde(rename = "courierLabel", skip_serializing_if = "Option::is_none")]
    pub courier_label: Option<String>,
    #[serde(rename = "serviceLabel", skip_serializing_if = "Option::is_none")]
    pub service_label: Option<String>,
}

/// Form fields tracked by the address binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressField {
    RecipientName,
    Phone,
    AddressLine,
    Province,
    City,
    District,
    Subdistrict,
    PostalCode,
    Courier,
    Service,
    Notes,
}

impl AddressField {
    /// Every tracked field, in form order.
    pub const ALL: [Self; 11] = [
        Self::RecipientName,
        Self::Phone,
        Self::AddressLine,
        Self::Province,
        Self::City,
        Self::District,
        Self::Subdistrict,
        Self::PostalCode,
        Self::Courier,
        Self::Service,
        Self::Notes,
    ];

    /// Whether the field is part of the shipping destination.
    #[must_use]
    pub const fn is_destination(&self) -> bool {
        matches!(
            self,
            Self::Province | Self::City | Self::District | Self::Subdistrict | Self::PostalCode
        )
    }

    /// Whether the field is a select whose option text is kept as a label.
    #[must_use]
    pub const fn has_label(&self) -> bool {
        matches!(
            self,
            Self::Province
                | Self::City
                | Self::District
                | Self::Subdistrict
                | Self::Courier
                | Self::Service
        )
    }
}

/// The part of an address that determines shipping rates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub province: String,
    pub city: String,
    pub district: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subdistrict: String,
    pub postal_code: String,
}

impl Destination {
    /// The most specific location code, used as the rate API destination id.
    #[must_use]
    pub fn location_id(&self) -> &str {
        if self.subdistrict.is_empty() {
            &self.district
        } else {
            &self.subdistrict
        }
    }
}

impl Address {
    /// Read a tracked field.
    #[must_use]
    pub fn get(&self, field: AddressField) -> &str {
        match field {
            AddressField::RecipientName => &self.recipient_name,
            AddressField::Phone => &self.phone,
            AddressField::AddressLine => &self.address_line,
            AddressField::Province => &self.province,
            AddressField::City => &self.city,
            AddressField::District => &self.district,
            AddressField::Subdistrict => &self.subdistrict,
            AddressField::PostalCode => &self.postal_code,
            AddressField::Courier => &self.courier,
            AddressField::Service => &self.service,
            AddressField::Notes => &self.notes,
        }
    }

    /// Overwrite a tracked field.
    pub fn set(&mut self, field: AddressField, value: impl Into<String>) {
        let slot = match field {
            AddressField::RecipientName => &mut self.recipient_name,
            AddressField::Phone => &mut self.phone,
            AddressField::AddressLine => &mut self.address_line,
            AddressField::Province => &mut self.province,
            AddressField::City => &mut self.city,
            AddressField::District => &mut self.district,
            AddressField::Subdistrict => &mut self.subdistrict,
            AddressField::PostalCode => &mut self.postal_code,
            AddressField::Courier => &mut self.courier,
            AddressField::Service => &mut self.service,
            AddressField::Notes => &mut self.notes,
        };
        *slot = value.into();
    }

    /// Set the display label of a select field. Ignored for free-text fields.
    pub fn set_label(&mut self, field: AddressField, label: Option<String>) {
        let slot = match field {
            AddressField::Province => &mut self.province_label,
            AddressField::City => &mut self.city_label,
            AddressField::District => &mut self.district_label,
            AddressField::Subdistrict => &mut self.subdistrict_label,
            AddressField::Courier => &mut self.courier_label,
            AddressField::Service => &mut self.service_label,
            _ => return,
        };
        *slot = label.filter(|l| !l.trim().is_empty());
    }

    /// The shipping destination, if every required part is filled in.
    ///
    /// Province, city, district and postal code are required; subdistrict is
    /// optional and refines the rate lookup when present.
    #[must_use]
    pub fn destination(&self) -> Option<Destination> {
        let required = [&self.province, &self.city, &self.district, &self.postal_code];
        if required.iter().any(|v| v.trim().is_empty()) {
            return None;
        }
        Some(Destination {
            province: self.province.trim().to_owned(),
            city: self.city.trim().to_owned(),
            district: self.district.trim().to_owned(),
            subdistrict: self.subdistrict.trim().to_owned(),
            postal_code: self.postal_code.trim().to_owned(),
        })
    }

    /// Overlay another record: every non-empty field of `other` replaces the
    /// matching field here, empty fields in `other` leave this one untouched.
    pub fn overlay(&mut self, other: &Self) {
        for field in AddressField::ALL {
            let value = other.get(field);
            if !value.trim().is_empty() {
                self.set(field, value);
            }
        }
        let labels = [
            (AddressField::Province, &other.province_label),
            (AddressField::City, &other.city_label),
            (AddressField::District, &other.district_label),
            (AddressField::Subdistrict, &other.subdistrict_label),
            (AddressField::Courier, &other.courier_label),
            (AddressField::Service, &other.service_label),
        ];
        for (field, label) in labels {
            if label.is_some() {
                self.set_label(field, label.clone());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jakarta() -> Address {
        Address {
            recipient_name: "Budi".into(),
            province: "6".into(),
            city: "152".into(),
            district: "1330".into(),
            postal_code: "12940".into(),
            ..Address::default()
        }
    }

    #[test]
    fn test_destination_requires_all_parts() {
        assert!(jakarta().destination().is_some());

        let mut missing = jakarta();
        missing.postal_code = "  ".into();
        assert!(missing.destination().is_none());
    }

    #[test]
    fn test_location_id_prefers_subdistrict() {
        let mut address = jakarta();
        assert_eq!(address.destination().unwrap().location_id(), "1330");
        address.subdistrict = "17485".into();
        assert_eq!(address.destination().unwrap().location_id(), "17485");
    }

    #[test]
    fn test_overlay_keeps_absent_fields() {
        let mut local = jakarta();
        local.notes = "leave at gate".into();
        let remote = Address {
            phone: "0812".into(),
            city: "153".into(),
            city_label: Some("Jakarta Selatan".into()),
            ..Address::default()
        };
        local.overlay(&remote);
        assert_eq!(local.phone, "0812");
        assert_eq!(local.city, "153");
        assert_eq!(local.city_label.as_deref(), Some("Jakarta Selatan"));
        assert_eq!(local.recipient_name, "Budi");
        assert_eq!(local.notes, "leave at gate");
    }

    #[test]
    fn test_labels_use_camel_case_keys() {
        let mut address = jakarta();
        address.set_label(AddressField::Province, Some("DKI Jakarta".into()));
        address.set_label(AddressField::Notes, Some("ignored".into()));
        let json = serde_json::to_value(&address).unwrap();
        assert_eq!(json["provinceLabel"], "DKI Jakarta");
        assert!(json.get("notesLabel").is_none());
    }

    #[test]
    fn test_partial_record_deserializes() {
        let address: Address = serde_json::from_str(r#"{"city":"152"}"#).unwrap();
        assert_eq!(address.city, "152");
        assert!(address.destination().is_none());
    }
}
