pub mod color;
pub mod color_match;
pub mod contour;
pub mod descriptor;
pub mod frame;
pub mod image_helper;
pub mod overlay;
pub mod region_extractor;
pub mod tracker;
