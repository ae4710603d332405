pub mod execservice;
