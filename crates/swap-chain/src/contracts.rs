//! Solidity bindings for the contracts the engine calls.

use alloy::sol;

sol! {
	#[sol(rpc)]
	interface IERC20 {
		function allowance(address owner, address spender) external view returns (uint256);
		function balanceOf(address account) external view returns (uint256);
		function approve(address spender, uint256 amount) external returns (bool);
	}

	#[sol(rpc)]
	interface IPermit2 {
		struct PermitDetails {
			address token;
			uint160 amount;
			uint48 expiration;
			uint48 nonce;
		}

		struct PermitSingle {
			PermitDetails details;
			address spender;
			uint256 sigDeadline;
		}

		function DOMAIN_SEPARATOR() external view returns (bytes32);
		function allowance(address user, address token, address spender)
			external
			view
			returns (uint160 amount, uint48 expiration, uint48 nonce);
		function permit(address owner, PermitSingle permitSingle, bytes signature) external;
	}

	#[sol(rpc)]
	interface IWrappedNative {
		function deposit() external payable;
		function withdraw(uint256 amount) external;
	}
}
