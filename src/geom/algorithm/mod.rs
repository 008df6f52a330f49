mod overlay;
mod proj;
mod repair;
