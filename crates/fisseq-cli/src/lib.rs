pub mod ovwt;
