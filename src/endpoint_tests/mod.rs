mod access;
mod helpers;
mod ordering;
