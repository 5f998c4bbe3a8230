mod coordinates;
mod montage;
