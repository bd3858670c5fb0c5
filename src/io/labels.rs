//! Contour type tags as they appear in the `contour_type` column of GP files.

pub const AORTA_VALVE: &str = "AORTA_VALVE";
pub const MITRAL_VALVE: &str = "MITRAL_VALVE";
pub const TRICUSPID_VALVE: &str = "TRICUSPID_VALVE";

pub const LAX_LV_EXTENT: &str = "LAX_LV_EXTENT";
pub const LAX_LA_EXTENT: &str = "LAX_LA_EXTENT";
pub const LAX_RV_EXTENT: &str = "LAX_RV_EXTENT";

pub const SAX_LV_EPICARDIAL: &str = "SAX_LV_EPICARDIAL";
pub const SAX_RV_ENDOCARDIAL: &str = "SAX_RV_ENDOCARDIAL";
pub const SAX_RV_SEPTUM: &str = "SAX_RV_SEPTUM";
pub const SAX_RV_FREEWALL: &str = "SAX_RV_FREEWALL";
pub const RV_INSERT: &str = "RV_INSERT";

pub const APEX_POINT: &str = "APEX_POINT";
